//! Collaborators the digest pipeline talks to.

use async_trait::async_trait;
use chrono::NaiveDate;
use secrecy::SecretString;
use thiserror::Error;

use crate::digest::model::WorkspaceDigest;
use crate::domain::cadence::{Cadence, DateWindow};
use crate::domain::feedback::{FeedbackRecord, IssueReport, MonthlyPoint, SummaryRow};

/// Where a workspace digest is posted.
#[derive(Clone, Debug)]
pub struct DeliveryTarget {
    pub workspace: String,
    pub channel: String,
    pub bot_token: SecretString,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EligibleWorkspace {
    pub workspace: String,
    pub channel: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactUpload {
    pub file_name: String,
    pub title: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub messages_sent: usize,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store query failed: {0}")]
    Query(String),
    #[error("no bot token installed for workspace `{0}`")]
    MissingBotToken(String),
}

#[derive(Debug, Error)]
pub enum SummarizerError {
    #[error("summarizer request failed: {0}")]
    Transport(String),
    #[error("summarizer returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("summarizer response could not be decoded: {0}")]
    Decode(String),
    #[error("no output_text segment found in summarizer response")]
    MissingOutput,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery request failed: {0}")]
    Transport(String),
    #[error("slack api error `{error}`{}", format_messages(.messages))]
    Api { error: String, messages: Vec<String> },
    #[error("failed to send message part {part}/{total}: {source}")]
    Chunk { part: usize, total: usize, source: Box<DeliveryError> },
}

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("not enough data to chart ({points} points, need at least {min})")]
    NotEnoughData { points: usize, min: usize },
    #[error("chart rendering failed: {0}")]
    Render(String),
    #[error("chart upload failed: {0}")]
    Upload(#[from] DeliveryError),
}

fn format_messages(messages: &[String]) -> String {
    if messages.is_empty() {
        String::new()
    } else {
        format!(" ({})", messages.join("; "))
    }
}

/// Read and write access to feedback, summaries, and issue reports.
#[async_trait]
pub trait DigestStore: Send + Sync {
    async fn eligible_workspaces(
        &self,
        cadence: Cadence,
        today: NaiveDate,
    ) -> Result<Vec<EligibleWorkspace>, StoreError>;

    async fn active_workspaces(&self, today: NaiveDate) -> Result<Vec<String>, StoreError>;

    async fn bot_token(&self, workspace: &str) -> Result<SecretString, StoreError>;

    async fn production_feedback(
        &self,
        workspace: &str,
        window: DateWindow,
    ) -> Result<Vec<FeedbackRecord>, StoreError>;

    /// Production feedback carrying a non-empty comment.
    async fn commented_feedback(
        &self,
        workspace: &str,
        window: DateWindow,
    ) -> Result<Vec<FeedbackRecord>, StoreError>;

    async fn summaries(
        &self,
        workspace: &str,
        window: DateWindow,
    ) -> Result<Vec<SummaryRow>, StoreError>;

    async fn insert_summary(&self, workspace: &str, row: &SummaryRow) -> Result<(), StoreError>;

    async fn clear_issue_reports(&self) -> Result<(), StoreError>;

    async fn upsert_issue_report(&self, report: &IssueReport) -> Result<(), StoreError>;
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, instructions: &str, input: &str) -> Result<String, SummarizerError>;
}

/// Produces PNG bytes for a monthly series.
#[async_trait]
pub trait ChartRenderer: Send + Sync {
    async fn render(&self, title: &str, points: &[MonthlyPoint]) -> Result<Vec<u8>, ChartError>;
}

/// Uploads a file to the delivery platform and returns its private URL.
#[async_trait]
pub trait ArtifactUploader: Send + Sync {
    async fn upload(
        &self,
        target: &DeliveryTarget,
        artifact: ArtifactUpload,
    ) -> Result<String, DeliveryError>;
}

#[async_trait]
pub trait DigestPublisher: Send + Sync {
    async fn publish(
        &self,
        target: &DeliveryTarget,
        digest: &WorkspaceDigest,
    ) -> Result<DeliveryReceipt, DeliveryError>;
}
