use serde::Serialize;

use crate::digest::grouping::CohortKey;
use crate::digest::stats::PeriodStats;
use crate::domain::cadence::Cadence;

pub const NO_COMMENTS_SUMMARY: &str = "No comments to summarize";

/// Everything the payload builder needs for one cohort.
#[derive(Clone, Debug, PartialEq)]
pub struct DigestEntry {
    pub key: CohortKey,
    pub stats: Option<PeriodStats>,
    /// Comments behind the cached summaries for this cohort.
    pub comment_count: u32,
    pub summary: String,
    pub chart_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WorkspaceDigest {
    pub workspace: String,
    pub cadence: Cadence,
    pub period_label: Option<String>,
    pub entries: Vec<DigestEntry>,
}

impl WorkspaceDigest {
    /// Entries ordered by origin, category, then prompt.
    pub fn sorted_entries(&self) -> Vec<&DigestEntry> {
        let mut entries: Vec<&DigestEntry> = self.entries.iter().collect();
        entries.sort_by(|left, right| left.key.cmp(&right.key));
        entries
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Workspace,
    Summary,
    Chart,
    Delivery,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UnitFailure {
    pub workspace: String,
    pub stage: FailureStage,
    pub cohort: Option<String>,
    pub message: String,
}

/// Outcome of one cadence run. Failures are collected per unit instead of
/// aborting the run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub cadence: Cadence,
    pub workspaces: usize,
    pub delivered: usize,
    pub skipped_empty: usize,
    pub failures: Vec<UnitFailure>,
}

impl RunReport {
    pub fn new(cadence: Cadence, workspaces: usize) -> Self {
        Self { cadence, workspaces, delivered: 0, skipped_empty: 0, failures: Vec::new() }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn record_failure(
        &mut self,
        workspace: &str,
        stage: FailureStage,
        cohort: Option<&CohortKey>,
        message: impl Into<String>,
    ) {
        self.failures.push(UnitFailure {
            workspace: workspace.to_owned(),
            stage,
            cohort: cohort.map(ToString::to_string),
            message: message.into(),
        });
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheReport {
    pub workspaces: usize,
    pub summaries_stored: usize,
    pub issue_reports_stored: usize,
    pub empty_issue_reports: usize,
    pub failures: Vec<UnitFailure>,
}

impl CacheReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn record_failure(
        &mut self,
        workspace: &str,
        stage: FailureStage,
        cohort: Option<&CohortKey>,
        message: impl Into<String>,
    ) {
        self.failures.push(UnitFailure {
            workspace: workspace.to_owned(),
            stage,
            cohort: cohort.map(ToString::to_string),
            message: message.into(),
        });
    }
}
