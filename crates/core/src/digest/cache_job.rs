//! Daily comment cache and issue report refresh.

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use tracing::{info, warn};

use crate::config::DigestConfig;
use crate::digest::grouping::{group_by_cohort, CohortKey, Granularity};
use crate::digest::input::{comments_csv, summaries_csv};
use crate::digest::model::{CacheReport, FailureStage};
use crate::digest::orchestrator::CohortError;
use crate::digest::ports::{DigestStore, StoreError, Summarizer};
use crate::digest::sampling::SamplingLimiter;
use crate::domain::cadence::DateWindow;
use crate::domain::feedback::{FeedbackRecord, IssueReport, SummaryRow};

pub const ISSUE_LOOKBACK_DAYS: u64 = 30;

#[derive(Clone, Debug)]
pub struct CacheSettings {
    pub input_limit: usize,
    pub comment_prompt: String,
    pub issue_prompt: String,
}

impl CacheSettings {
    pub fn from_config(config: &DigestConfig) -> Self {
        Self {
            input_limit: config.cache_input_limit,
            comment_prompt: config.prompts.comment_cache.clone(),
            issue_prompt: config.prompts.issue_cache.clone(),
        }
    }
}

pub struct DailyCacheJob {
    store: Arc<dyn DigestStore>,
    summarizer: Arc<dyn Summarizer>,
    sampler: SamplingLimiter,
    settings: CacheSettings,
}

impl DailyCacheJob {
    pub fn new(
        store: Arc<dyn DigestStore>,
        summarizer: Arc<dyn Summarizer>,
        settings: CacheSettings,
    ) -> Self {
        Self { store, summarizer, sampler: SamplingLimiter::from_entropy(), settings }
    }

    pub fn with_sampler(mut self, sampler: SamplingLimiter) -> Self {
        self.sampler = sampler;
        self
    }

    /// Issue reports are a point-in-time view, so the table is cleared first.
    /// A failed clear or workspace listing aborts; later failures are recorded.
    pub async fn run(&self, today: NaiveDate) -> Result<CacheReport, StoreError> {
        info!(event_name = "cache.run.started", %today, "daily cache job started");

        self.store.clear_issue_reports().await?;
        let workspaces = self.store.active_workspaces(today).await?;
        let mut report = CacheReport { workspaces: workspaces.len(), ..CacheReport::default() };

        for workspace in &workspaces {
            if let Err(error) = self.cache_workspace(workspace, today, &mut report).await {
                warn!(
                    event_name = "cache.workspace.failed",
                    workspace = %workspace,
                    error = %error,
                    "skipping workspace"
                );
                report.record_failure(workspace, FailureStage::Workspace, None, error.to_string());
            }
        }

        info!(
            event_name = "cache.run.finished",
            workspaces = report.workspaces,
            summaries = report.summaries_stored,
            issue_reports = report.issue_reports_stored,
            failures = report.failures.len(),
            "daily cache job finished"
        );
        Ok(report)
    }

    async fn cache_workspace(
        &self,
        workspace: &str,
        today: NaiveDate,
        report: &mut CacheReport,
    ) -> Result<(), StoreError> {
        let yesterday = today - Days::new(1);
        let comments = self.store.commented_feedback(workspace, DateWindow::new(yesterday, today)).await?;
        let cohorts = group_by_cohort(comments, Granularity::OriginCategoryPrompt);

        for (key, records) in cohorts {
            let comment_count = u32::try_from(records.len()).unwrap_or(u32::MAX);
            let summary = match self.summarize_comments(&key, records).await {
                Ok(summary) => summary,
                Err(error) => {
                    warn!(
                        event_name = "cache.cohort.failed",
                        workspace,
                        cohort = %key,
                        error = %error,
                        "cohort not cached"
                    );
                    report.record_failure(workspace, FailureStage::Summary, Some(&key), error.to_string());
                    continue;
                }
            };

            let row = SummaryRow {
                summary_date: yesterday,
                origin: key.origin.clone(),
                category: key.category().to_owned(),
                prompt: key.prompt().to_owned(),
                comment_count,
                summary,
            };
            self.store.insert_summary(workspace, &row).await?;
            report.summaries_stored += 1;
            info!(event_name = "cache.cohort.stored", workspace, cohort = %key, comment_count, "summary cached");
        }

        self.refresh_issue_reports(workspace, today, report).await
    }

    async fn summarize_comments(
        &self,
        key: &CohortKey,
        records: Vec<FeedbackRecord>,
    ) -> Result<String, CohortError> {
        let sampled = self.sampler.limit(records, self.settings.input_limit);
        let input = comments_csv(key.prompt(), &sampled)?;
        let summary = self.summarizer.summarize(&self.settings.comment_prompt, &input).await?;
        Ok(summary.trim().to_owned())
    }

    async fn refresh_issue_reports(
        &self,
        workspace: &str,
        today: NaiveDate,
        report: &mut CacheReport,
    ) -> Result<(), StoreError> {
        let window = DateWindow::new(today - Days::new(ISSUE_LOOKBACK_DAYS), today);
        let history = self.store.summaries(workspace, window).await?;

        for (key, rows) in group_by_cohort(history, Granularity::Origin) {
            let issues = match self.summarize_issues(rows).await {
                Ok(issues) => issues,
                Err(error) => {
                    warn!(
                        event_name = "cache.issues.failed",
                        workspace,
                        origin = %key.origin,
                        error = %error,
                        "issue report not refreshed"
                    );
                    report.record_failure(workspace, FailureStage::Summary, Some(&key), error.to_string());
                    continue;
                }
            };

            if issues.is_empty() {
                info!(event_name = "cache.issues.empty", workspace, origin = %key.origin, "nothing notable");
                report.empty_issue_reports += 1;
                continue;
            }

            let issue_report =
                IssueReport { workspace: workspace.to_owned(), origin: key.origin, report: issues };
            self.store.upsert_issue_report(&issue_report).await?;
            report.issue_reports_stored += 1;
        }

        Ok(())
    }

    async fn summarize_issues(&self, rows: Vec<SummaryRow>) -> Result<String, CohortError> {
        let sampled = self.sampler.limit(rows, self.settings.input_limit);
        let input = summaries_csv(&sampled, true)?;
        let issues = self.summarizer.summarize(&self.settings.issue_prompt, &input).await?;
        Ok(issues.trim().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use super::{CacheSettings, DailyCacheJob};
    use crate::digest::fakes::{date, feedback, summary_row, FakeStore, ScriptedSummarizer};
    use crate::digest::model::FailureStage;
    use crate::digest::ports::SummarizerError;
    use crate::digest::sampling::SamplingLimiter;

    const DOCS: (&str, &str, &str) = ("docs", "api", "summarize");
    const APP: (&str, &str, &str) = ("app", "search", "find");

    fn settings(limit: usize) -> CacheSettings {
        CacheSettings {
            input_limit: limit,
            comment_prompt: "cache comments".to_owned(),
            issue_prompt: "find issues".to_owned(),
        }
    }

    fn job(store: Arc<FakeStore>, summarizer: Arc<ScriptedSummarizer>, limit: usize) -> DailyCacheJob {
        DailyCacheJob::new(store, summarizer, settings(limit)).with_sampler(SamplingLimiter::seeded(9))
    }

    #[tokio::test]
    async fn caches_one_summary_per_cohort_for_yesterday() {
        let mut store = FakeStore::default().with_workspace("T1", "C1");
        for user in ["U1", "U2", "U3"] {
            store.feedback.push(feedback("T1", DOCS, user, false, Some("slow"), "2026-10-18"));
        }
        store.feedback.push(feedback("T1", DOCS, "U4", true, None, "2026-10-18"));
        store.feedback.push(feedback("T1", DOCS, "U5", false, Some("older"), "2026-10-17"));
        let store = Arc::new(store);
        let summarizer = Arc::new(ScriptedSummarizer::new(|instructions, _| {
            Ok(if instructions == "cache comments" { "Users find it slow" } else { "" }.to_owned())
        }));

        let report = job(store.clone(), summarizer.clone(), 2).run(date("2026-10-19")).await.expect("run");

        assert!(report.is_clean());
        assert_eq!(report.summaries_stored, 1);
        let stored = store.stored_summaries();
        assert_eq!(stored.len(), 1);
        let (workspace, row) = &stored[0];
        assert_eq!(workspace, "T1");
        assert_eq!(row.summary_date, date("2026-10-18"));
        assert_eq!(row.comment_count, 3);
        assert_eq!(row.summary, "Users find it slow");

        let calls = summarizer.recorded();
        let comment_rows = calls[0].1.lines().skip_while(|line| *line != "comment,user_id").count() - 1;
        assert_eq!(comment_rows, 2);
    }

    #[tokio::test]
    async fn issue_reports_are_refreshed_per_origin_and_blank_reports_skipped() {
        let store = FakeStore::default()
            .with_workspace("T1", "C1")
            .with_summary("T1", summary_row(DOCS, "2026-10-01", 4, "Missing examples"))
            .with_summary("T1", summary_row(APP, "2026-10-02", 2, "Fine overall"))
            .with_summary("T1", summary_row(APP, "2026-08-01", 2, "outside lookback"));
        let store = Arc::new(store);
        let summarizer = Arc::new(ScriptedSummarizer::new(|_, input| {
            Ok(if input.contains("Missing examples") { "1. Examples missing" } else { "   " }.to_owned())
        }));

        let report = job(store.clone(), summarizer.clone(), 10).run(date("2026-10-19")).await.expect("run");

        assert_eq!(store.clears.load(Ordering::SeqCst), 1);
        assert_eq!(report.issue_reports_stored, 1);
        assert_eq!(report.empty_issue_reports, 1);
        let issues = store.stored_issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].origin, "docs");
        assert_eq!(issues[0].report, "1. Examples missing");

        let app_call = summarizer
            .recorded()
            .into_iter()
            .find(|(_, input)| input.contains("Fine overall"))
            .expect("app origin summarized");
        assert!(!app_call.1.contains("outside lookback"));
        assert!(app_call.1.starts_with("summary_date,category,prompt,n_comments,summary"));
    }

    #[tokio::test]
    async fn failed_cohort_is_recorded_and_others_still_cached() {
        let mut store = FakeStore::default().with_workspace("T1", "C1");
        store.feedback.push(feedback("T1", DOCS, "U1", false, Some("bad docs"), "2026-10-18"));
        store.feedback.push(feedback("T1", APP, "U2", false, Some("bad search"), "2026-10-18"));
        let store = Arc::new(store);
        let summarizer = Arc::new(ScriptedSummarizer::new(|_, input| {
            if input.contains("bad search") {
                Err(SummarizerError::MissingOutput)
            } else {
                Ok("summary".to_owned())
            }
        }));

        let report = job(store.clone(), summarizer, 10).run(date("2026-10-19")).await.expect("run");

        assert_eq!(report.summaries_stored, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].stage, FailureStage::Summary);
        assert_eq!(report.failures[0].cohort.as_deref(), Some("app/search/find"));
        assert_eq!(store.stored_summaries()[0].1.origin, "docs");
    }
}
