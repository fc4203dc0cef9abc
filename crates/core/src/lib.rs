pub mod config;
pub mod digest;
pub mod domain;
pub mod errors;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use domain::account::{Account, WorkspaceSettings};
pub use domain::cadence::{due_cadences, is_first_weekday_of_month, Cadence, DateWindow};
pub use domain::feedback::{
    FeedbackFilter, FeedbackRecord, FeedbackSubmission, IssueReport, MonthlyPoint,
    RegisteredPrompt, SummaryRow,
};
pub use errors::DomainError;
