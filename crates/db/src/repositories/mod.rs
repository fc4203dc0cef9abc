use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use thiserror::Error;

use tally_core::digest::ports::StoreError;
use tally_core::domain::account::{Account, WorkspaceSettings};
use tally_core::domain::cadence::DateWindow;
use tally_core::domain::feedback::{FeedbackFilter, FeedbackRecord, IssueReport, RegisteredPrompt};

pub mod account;
pub mod digest_store;
pub mod feedback;
pub mod installation;

pub use account::SqlAccountRepository;
pub use digest_store::SqlDigestStore;
pub use feedback::SqlFeedbackRepository;
pub use installation::SqlInstallationRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for StoreError {
    fn from(error: RepositoryError) -> Self {
        StoreError::Query(error.to_string())
    }
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn find_by_api_key(&self, api_key: &str) -> Result<Option<Account>, RepositoryError>;

    /// Inserts a new account. Identifier or credential collisions are errors.
    async fn create(&self, account: &Account) -> Result<(), RepositoryError>;

    /// Links the account holding `activation_code` to `workspace`. Returns
    /// `false` when the code is unknown or already linked.
    async fn link_workspace(
        &self,
        activation_code: &str,
        workspace: &str,
    ) -> Result<bool, RepositoryError>;

    /// Settings of the longest-lived account linked to `workspace`.
    async fn workspace_settings(
        &self,
        workspace: &str,
    ) -> Result<Option<WorkspaceSettings>, RepositoryError>;

    async fn set_channel(&self, workspace: &str, channel: Option<&str>) -> Result<(), RepositoryError>;

    async fn rotate_api_key(&self, workspace: &str, api_key: &str) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait InstallationRepository: Send + Sync {
    async fn bot_token(&self, workspace: &str) -> Result<Option<String>, RepositoryError>;
    async fn save(&self, workspace: &str, bot_token: &str) -> Result<(), RepositoryError>;
    /// Returns whether an installation was removed.
    async fn remove(&self, workspace: &str) -> Result<bool, RepositoryError>;
}

/// How many distinct prompts a workspace has registered and whether a given
/// prompt is one of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PromptUsage {
    pub registered: u32,
    pub exists: bool,
}

#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    async fn prompt_usage(
        &self,
        workspace: &str,
        origin: &str,
        category: &str,
        prompt: &str,
    ) -> Result<PromptUsage, RepositoryError>;

    /// Registers the record's prompt if new, stores the record, and bumps the
    /// owning account's monthly counter, all in one transaction.
    async fn insert(&self, account_id: &str, record: &FeedbackRecord) -> Result<(), RepositoryError>;

    async fn explore(
        &self,
        workspace: &str,
        window: DateWindow,
        filter: &FeedbackFilter,
    ) -> Result<Vec<FeedbackRecord>, RepositoryError>;

    async fn issue_reports(&self, workspace: &str) -> Result<Vec<IssueReport>, RepositoryError>;

    /// Registered prompts ordered by origin, category, then prompt text.
    async fn prompts(&self, workspace: &str) -> Result<Vec<RegisteredPrompt>, RepositoryError>;

    async fn prompt(
        &self,
        workspace: &str,
        id: i64,
    ) -> Result<Option<RegisteredPrompt>, RepositoryError>;

    /// Removes the prompt with its feedback and cached summaries. Returns
    /// `false` when `workspace` has no prompt `id`.
    async fn delete_prompt(&self, workspace: &str, id: i64) -> Result<bool, RepositoryError>;

    /// Newest non-production feedback, up to `limit` rows.
    async fn test_feedback(
        &self,
        workspace: &str,
        limit: u32,
    ) -> Result<Vec<FeedbackRecord>, RepositoryError>;
}

pub(crate) fn encode_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn decode_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("timestamp `{value}`: {error}")))
}

pub(crate) fn encode_date(value: NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

pub(crate) fn decode_date(value: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|error| RepositoryError::Decode(format!("date `{value}`: {error}")))
}

pub(crate) fn decode_count(value: i64, column: &str) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::Decode(format!("{column} out of range: {value}")))
}
