pub mod account;
pub mod cadence;
pub mod feedback;
