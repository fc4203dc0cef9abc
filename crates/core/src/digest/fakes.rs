//! In-memory collaborators for digest pipeline tests.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use secrecy::SecretString;

use crate::digest::model::WorkspaceDigest;
use crate::digest::ports::{
    ArtifactUpload, ArtifactUploader, ChartError, ChartRenderer, DeliveryError, DeliveryReceipt,
    DeliveryTarget, DigestPublisher, DigestStore, EligibleWorkspace, StoreError, Summarizer,
    SummarizerError,
};
use crate::domain::cadence::{Cadence, DateWindow};
use crate::domain::feedback::{FeedbackRecord, IssueReport, MonthlyPoint, SummaryRow};

pub(crate) fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid test date")
}

pub(crate) fn at(value: &str) -> DateTime<Utc> {
    let day = date(value);
    Utc.from_utc_datetime(&day.and_hms_opt(12, 0, 0).expect("valid time"))
}

pub(crate) fn feedback(
    workspace: &str,
    key: (&str, &str, &str),
    user: &str,
    thumb_up: bool,
    comment: Option<&str>,
    day: &str,
) -> FeedbackRecord {
    FeedbackRecord {
        workspace: workspace.to_owned(),
        prompt: key.2.to_owned(),
        thumb_up,
        comment: comment.map(str::to_owned),
        origin: key.0.to_owned(),
        category: key.1.to_owned(),
        in_production: true,
        user_id: user.to_owned(),
        created_at: at(day),
    }
}

pub(crate) fn summary_row(key: (&str, &str, &str), day: &str, comments: u32, text: &str) -> SummaryRow {
    SummaryRow {
        summary_date: date(day),
        origin: key.0.to_owned(),
        category: key.1.to_owned(),
        prompt: key.2.to_owned(),
        comment_count: comments,
        summary: text.to_owned(),
    }
}

#[derive(Default)]
pub(crate) struct FakeStore {
    pub eligible: Vec<EligibleWorkspace>,
    pub tokens: HashMap<String, String>,
    pub feedback: Vec<FeedbackRecord>,
    pub summaries: Mutex<Vec<(String, SummaryRow)>>,
    pub issues: Mutex<Vec<IssueReport>>,
    pub failing_queries: HashSet<String>,
    pub clears: AtomicUsize,
}

impl FakeStore {
    pub fn with_workspace(mut self, workspace: &str, channel: &str) -> Self {
        self.eligible.push(EligibleWorkspace {
            workspace: workspace.to_owned(),
            channel: channel.to_owned(),
        });
        self.tokens.insert(workspace.to_owned(), format!("xoxb-{workspace}"));
        self
    }

    pub fn with_summary(self, workspace: &str, row: SummaryRow) -> Self {
        self.summaries.lock().expect("summaries lock").push((workspace.to_owned(), row));
        self
    }

    pub fn stored_summaries(&self) -> Vec<(String, SummaryRow)> {
        self.summaries.lock().expect("summaries lock").clone()
    }

    pub fn stored_issues(&self) -> Vec<IssueReport> {
        self.issues.lock().expect("issues lock").clone()
    }

    fn check(&self, workspace: &str) -> Result<(), StoreError> {
        if self.failing_queries.contains(workspace) {
            return Err(StoreError::Query(format!("query failed for {workspace}")));
        }
        Ok(())
    }
}

#[async_trait]
impl DigestStore for FakeStore {
    async fn eligible_workspaces(
        &self,
        _cadence: Cadence,
        _today: NaiveDate,
    ) -> Result<Vec<EligibleWorkspace>, StoreError> {
        Ok(self.eligible.clone())
    }

    async fn active_workspaces(&self, _today: NaiveDate) -> Result<Vec<String>, StoreError> {
        let unique: BTreeSet<String> =
            self.eligible.iter().map(|entry| entry.workspace.clone()).collect();
        Ok(unique.into_iter().collect())
    }

    async fn bot_token(&self, workspace: &str) -> Result<SecretString, StoreError> {
        self.tokens
            .get(workspace)
            .map(|token| SecretString::from(token.clone()))
            .ok_or_else(|| StoreError::MissingBotToken(workspace.to_owned()))
    }

    async fn production_feedback(
        &self,
        workspace: &str,
        window: DateWindow,
    ) -> Result<Vec<FeedbackRecord>, StoreError> {
        self.check(workspace)?;
        Ok(self
            .feedback
            .iter()
            .filter(|record| {
                record.workspace == workspace
                    && record.in_production
                    && window.contains(record.created_at)
            })
            .cloned()
            .collect())
    }

    async fn commented_feedback(
        &self,
        workspace: &str,
        window: DateWindow,
    ) -> Result<Vec<FeedbackRecord>, StoreError> {
        let records = self.production_feedback(workspace, window).await?;
        Ok(records.into_iter().filter(FeedbackRecord::has_comment).collect())
    }

    async fn summaries(
        &self,
        workspace: &str,
        window: DateWindow,
    ) -> Result<Vec<SummaryRow>, StoreError> {
        self.check(workspace)?;
        Ok(self
            .stored_summaries()
            .into_iter()
            .filter(|(owner, row)| {
                owner == workspace
                    && row.summary_date >= window.start
                    && row.summary_date < window.end
            })
            .map(|(_, row)| row)
            .collect())
    }

    async fn insert_summary(&self, workspace: &str, row: &SummaryRow) -> Result<(), StoreError> {
        self.summaries.lock().expect("summaries lock").push((workspace.to_owned(), row.clone()));
        Ok(())
    }

    async fn clear_issue_reports(&self) -> Result<(), StoreError> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.issues.lock().expect("issues lock").clear();
        Ok(())
    }

    async fn upsert_issue_report(&self, report: &IssueReport) -> Result<(), StoreError> {
        let mut issues = self.issues.lock().expect("issues lock");
        issues.retain(|existing| {
            existing.workspace != report.workspace || existing.origin != report.origin
        });
        issues.push(report.clone());
        Ok(())
    }
}

type Responder = Box<dyn Fn(&str, &str) -> Result<String, SummarizerError> + Send + Sync>;

pub(crate) struct ScriptedSummarizer {
    respond: Responder,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedSummarizer {
    pub fn new(
        respond: impl Fn(&str, &str) -> Result<String, SummarizerError> + Send + Sync + 'static,
    ) -> Self {
        Self { respond: Box::new(respond), calls: Mutex::new(Vec::new()) }
    }

    pub fn constant(text: &'static str) -> Self {
        Self::new(move |_, _| Ok(text.to_owned()))
    }

    pub fn recorded(&self) -> Vec<(String, String)> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl Summarizer for ScriptedSummarizer {
    async fn summarize(&self, instructions: &str, input: &str) -> Result<String, SummarizerError> {
        self.calls.lock().expect("calls lock").push((instructions.to_owned(), input.to_owned()));
        (self.respond)(instructions, input)
    }
}

#[derive(Default)]
pub(crate) struct RecordingPublisher {
    pub failing: HashSet<String>,
    pub published: Mutex<Vec<(String, WorkspaceDigest)>>,
}

impl RecordingPublisher {
    pub fn digests(&self) -> Vec<(String, WorkspaceDigest)> {
        self.published.lock().expect("published lock").clone()
    }
}

#[async_trait]
impl DigestPublisher for RecordingPublisher {
    async fn publish(
        &self,
        target: &DeliveryTarget,
        digest: &WorkspaceDigest,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        if self.failing.contains(&target.workspace) {
            return Err(DeliveryError::Chunk {
                part: 1,
                total: 2,
                source: Box::new(DeliveryError::Transport("connection reset".to_owned())),
            });
        }
        self.published
            .lock()
            .expect("published lock")
            .push((target.channel.clone(), digest.clone()));
        Ok(DeliveryReceipt { messages_sent: 1 })
    }
}

pub(crate) struct StaticRenderer;

#[async_trait]
impl ChartRenderer for StaticRenderer {
    async fn render(&self, _title: &str, _points: &[MonthlyPoint]) -> Result<Vec<u8>, ChartError> {
        Ok(b"png".to_vec())
    }
}

pub(crate) struct StaticUploader;

#[async_trait]
impl ArtifactUploader for StaticUploader {
    async fn upload(
        &self,
        target: &DeliveryTarget,
        artifact: ArtifactUpload,
    ) -> Result<String, DeliveryError> {
        Ok(format!("https://files.slack.test/{}/{}", target.workspace, artifact.file_name))
    }
}

pub(crate) struct FailingRenderer;

#[async_trait]
impl ChartRenderer for FailingRenderer {
    async fn render(&self, _title: &str, _points: &[MonthlyPoint]) -> Result<Vec<u8>, ChartError> {
        Err(ChartError::Render("renderer exited with status 1".to_owned()))
    }
}

pub(crate) struct FailingUploader;

#[async_trait]
impl ArtifactUploader for FailingUploader {
    async fn upload(
        &self,
        _target: &DeliveryTarget,
        _artifact: ArtifactUpload,
    ) -> Result<String, DeliveryError> {
        Err(DeliveryError::Api { error: "not_allowed_token_type".to_owned(), messages: Vec::new() })
    }
}
