//! Per-cadence digest runs.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::config::DigestConfig;
use crate::digest::chart::ChartGenerator;
use crate::digest::grouping::{group_by_cohort, CohortKey, Cohorts};
use crate::digest::input::{summaries_csv, InputError};
use crate::digest::model::{
    DigestEntry, FailureStage, RunReport, WorkspaceDigest, NO_COMMENTS_SUMMARY,
};
use crate::digest::ports::{
    ChartError, DeliveryTarget, DigestPublisher, DigestStore, EligibleWorkspace, StoreError,
    Summarizer, SummarizerError,
};
use crate::digest::sampling::SamplingLimiter;
use crate::digest::stats::{monthly_points, PeriodStats};
use crate::domain::cadence::{chart_window, Cadence};
use crate::domain::feedback::{FeedbackRecord, SummaryRow};

#[derive(Debug, thiserror::Error)]
pub enum CohortError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Summarizer(#[from] SummarizerError),
}

#[derive(Clone, Debug)]
pub struct DigestSettings {
    pub input_limit: usize,
    pub daily_prompt: String,
    pub weekly_prompt: String,
    pub monthly_prompt: String,
    pub quarterly_prompt: String,
    /// Wait between chart uploads and delivery so Slack can serve the files.
    pub chart_delay: Duration,
}

impl DigestSettings {
    pub fn from_config(config: &DigestConfig) -> Self {
        Self {
            input_limit: config.digest_input_limit,
            daily_prompt: config.prompts.daily.clone(),
            weekly_prompt: config.prompts.weekly.clone(),
            monthly_prompt: config.prompts.monthly.clone(),
            quarterly_prompt: config.prompts.quarterly.clone(),
            chart_delay: Duration::from_secs(config.chart_delay_secs),
        }
    }

    fn prompt(&self, cadence: Cadence) -> &str {
        match cadence {
            Cadence::Daily => &self.daily_prompt,
            Cadence::Weekly => &self.weekly_prompt,
            Cadence::Monthly => &self.monthly_prompt,
            Cadence::Quarterly => &self.quarterly_prompt,
        }
    }
}

/// Runs one cadence across all eligible workspaces, one workspace and one
/// cohort at a time.
pub struct DigestOrchestrator {
    store: Arc<dyn DigestStore>,
    summarizer: Arc<dyn Summarizer>,
    publisher: Arc<dyn DigestPublisher>,
    charts: Option<ChartGenerator>,
    sampler: SamplingLimiter,
    settings: DigestSettings,
}

struct CohortSources {
    summaries: Cohorts<SummaryRow>,
    current: Cohorts<FeedbackRecord>,
    previous: Cohorts<FeedbackRecord>,
    history: Cohorts<FeedbackRecord>,
}

impl DigestOrchestrator {
    pub fn new(
        store: Arc<dyn DigestStore>,
        summarizer: Arc<dyn Summarizer>,
        publisher: Arc<dyn DigestPublisher>,
        settings: DigestSettings,
    ) -> Self {
        Self {
            store,
            summarizer,
            publisher,
            charts: None,
            sampler: SamplingLimiter::from_entropy(),
            settings,
        }
    }

    pub fn with_charts(mut self, charts: ChartGenerator) -> Self {
        self.charts = Some(charts);
        self
    }

    pub fn with_sampler(mut self, sampler: SamplingLimiter) -> Self {
        self.sampler = sampler;
        self
    }

    /// Only a failure to list workspaces aborts the run. Everything below
    /// that is recorded in the report and the run moves on.
    pub async fn run(&self, cadence: Cadence, today: NaiveDate) -> Result<RunReport, StoreError> {
        info!(event_name = "digest.run.started", %cadence, %today, "digest run started");

        let workspaces = self.store.eligible_workspaces(cadence, today).await?;
        let mut report = RunReport::new(cadence, workspaces.len());
        let mut ready = Vec::new();

        for workspace in &workspaces {
            match self.build_workspace(cadence, today, workspace, &mut report).await {
                Ok(Some(built)) => ready.push(built),
                Ok(None) => {
                    info!(
                        event_name = "digest.workspace.empty",
                        %cadence,
                        workspace = %workspace.workspace,
                        "no cohorts to report"
                    );
                    report.skipped_empty += 1;
                }
                Err(error) => {
                    warn!(
                        event_name = "digest.workspace.failed",
                        %cadence,
                        workspace = %workspace.workspace,
                        error = %error,
                        "skipping workspace"
                    );
                    report.record_failure(
                        &workspace.workspace,
                        FailureStage::Workspace,
                        None,
                        error.to_string(),
                    );
                }
            }
        }

        if cadence.has_charts() && !ready.is_empty() && !self.settings.chart_delay.is_zero() {
            tokio::time::sleep(self.settings.chart_delay).await;
        }

        for (target, digest) in &ready {
            match self.publisher.publish(target, digest).await {
                Ok(receipt) => {
                    info!(
                        event_name = "digest.workspace.delivered",
                        %cadence,
                        workspace = %target.workspace,
                        messages = receipt.messages_sent,
                        entries = digest.entries.len(),
                        "digest delivered"
                    );
                    report.delivered += 1;
                }
                Err(error) => {
                    warn!(
                        event_name = "digest.delivery.failed",
                        %cadence,
                        workspace = %target.workspace,
                        error = %error,
                        "digest delivery aborted"
                    );
                    report.record_failure(
                        &target.workspace,
                        FailureStage::Delivery,
                        None,
                        error.to_string(),
                    );
                }
            }
        }

        info!(
            event_name = "digest.run.finished",
            %cadence,
            workspaces = report.workspaces,
            delivered = report.delivered,
            failures = report.failures.len(),
            "digest run finished"
        );
        Ok(report)
    }

    async fn build_workspace(
        &self,
        cadence: Cadence,
        today: NaiveDate,
        workspace: &EligibleWorkspace,
        report: &mut RunReport,
    ) -> Result<Option<(DeliveryTarget, WorkspaceDigest)>, StoreError> {
        let target = DeliveryTarget {
            workspace: workspace.workspace.clone(),
            channel: workspace.channel.clone(),
            bot_token: self.store.bot_token(&workspace.workspace).await?,
        };
        let sources = self.load_sources(cadence, today, &workspace.workspace).await?;

        let keys: Vec<CohortKey> = if cadence.has_stats() {
            sources.current.keys().cloned().collect()
        } else {
            sources.summaries.keys().cloned().collect()
        };

        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let summaries = sources.summaries.get(&key).cloned().unwrap_or_default();
            let comment_count: u32 = summaries.iter().map(|row| row.comment_count).sum();

            let summary = match self.summarize(cadence, summaries).await {
                Ok(summary) => summary,
                Err(error) => {
                    warn!(
                        event_name = "digest.cohort.failed",
                        %cadence,
                        workspace = %target.workspace,
                        cohort = %key,
                        error = %error,
                        "dropping cohort from digest"
                    );
                    report.record_failure(
                        &target.workspace,
                        FailureStage::Summary,
                        Some(&key),
                        error.to_string(),
                    );
                    continue;
                }
            };

            let stats = cadence.has_stats().then(|| {
                PeriodStats::compute(
                    sources.current.get(&key).map(Vec::as_slice).unwrap_or_default(),
                    sources.previous.get(&key).map(Vec::as_slice).unwrap_or_default(),
                )
            });

            let chart_url = match &self.charts {
                Some(charts) if cadence.has_charts() => {
                    let history = sources.history.get(&key).map(Vec::as_slice).unwrap_or_default();
                    self.chart_for(charts, &target, &key, history, report).await
                }
                _ => None,
            };

            entries.push(DigestEntry { key, stats, comment_count, summary, chart_url });
        }

        if entries.is_empty() {
            return Ok(None);
        }

        let digest = WorkspaceDigest {
            workspace: target.workspace.clone(),
            cadence,
            period_label: cadence.period_label(today),
            entries,
        };
        Ok(Some((target, digest)))
    }

    async fn load_sources(
        &self,
        cadence: Cadence,
        today: NaiveDate,
        workspace: &str,
    ) -> Result<CohortSources, StoreError> {
        let granularity = cadence.granularity();
        let windows = cadence.windows(today);

        let summaries = self.store.summaries(workspace, windows.current).await?;
        let mut sources = CohortSources {
            summaries: group_by_cohort(summaries, granularity),
            current: Cohorts::new(),
            previous: Cohorts::new(),
            history: Cohorts::new(),
        };

        if cadence.has_stats() {
            let current = self.store.production_feedback(workspace, windows.current).await?;
            let previous = self.store.production_feedback(workspace, windows.previous).await?;
            sources.current = group_by_cohort(current, granularity);
            sources.previous = group_by_cohort(previous, granularity);
        }

        if cadence.has_charts() && self.charts.is_some() {
            let history = self.store.production_feedback(workspace, chart_window(today)).await?;
            sources.history = group_by_cohort(history, granularity);
        }

        Ok(sources)
    }

    async fn summarize(
        &self,
        cadence: Cadence,
        summaries: Vec<SummaryRow>,
    ) -> Result<String, CohortError> {
        if summaries.is_empty() {
            return Ok(NO_COMMENTS_SUMMARY.to_owned());
        }

        let sampled = self.sampler.limit(summaries, self.settings.input_limit);
        let input = summaries_csv(&sampled, cadence.dated_summaries())?;
        let summary = self.summarizer.summarize(self.settings.prompt(cadence), &input).await?;
        Ok(summary.trim().to_owned())
    }

    async fn chart_for(
        &self,
        charts: &ChartGenerator,
        target: &DeliveryTarget,
        key: &CohortKey,
        history: &[FeedbackRecord],
        report: &mut RunReport,
    ) -> Option<String> {
        let points = monthly_points(history);
        let title = chart_title(key);

        match charts.generate(target, &title, &points).await {
            Ok(url) => Some(url),
            Err(ChartError::NotEnoughData { points, .. }) => {
                info!(
                    event_name = "digest.chart.skipped",
                    workspace = %target.workspace,
                    cohort = %key,
                    points,
                    "not enough data for chart"
                );
                None
            }
            Err(error) => {
                warn!(
                    event_name = "digest.chart.failed",
                    workspace = %target.workspace,
                    cohort = %key,
                    error = %error,
                    "continuing without chart"
                );
                report.record_failure(
                    &target.workspace,
                    FailureStage::Chart,
                    Some(key),
                    error.to_string(),
                );
                None
            }
        }
    }
}

fn chart_title(key: &CohortKey) -> String {
    match &key.category {
        Some(category) => format!("{} {}", key.origin, category),
        None => key.origin.clone(),
    }
}
