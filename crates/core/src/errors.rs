use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid feedback field `{field}`: {reason}")]
    InvalidFeedback { field: &'static str, reason: String },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}
