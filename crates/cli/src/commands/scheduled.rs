use chrono::NaiveDate;
use serde::Serialize;
use tally_core::config::LoadOptions;
use tally_core::digest::{CacheReport, RunReport};
use tally_core::{due_cadences, is_first_weekday_of_month, Cadence};
use tally_db::{run_cleanup, CleanupReport};
use tracing::{error, info, warn};

use crate::commands::wiring::{block_on, build_pipeline, load_config, open_database};
use crate::commands::CommandResult;

#[derive(Debug, Default, Serialize)]
pub struct ScheduledReport {
    pub date: String,
    pub cache: Option<CacheReport>,
    pub cache_error: Option<String>,
    pub digests: Vec<RunReport>,
    pub digest_errors: Vec<CadenceError>,
    pub cleanup: Option<CleanupReport>,
    pub cleanup_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CadenceError {
    pub cadence: Cadence,
    pub message: String,
}

impl ScheduledReport {
    fn digests_clean(&self) -> bool {
        self.digest_errors.is_empty() && self.digests.iter().all(RunReport::is_clean)
    }

    pub fn is_clean(&self) -> bool {
        self.cache_error.is_none()
            && self.cache.as_ref().map_or(true, CacheReport::is_clean)
            && self.digests_clean()
            && self.cleanup_error.is_none()
    }
}

/// Cache job, then every cadence due on `today`, then cleanup on the first
/// weekday of the month when all digests went out cleanly.
pub fn run(options: &LoadOptions, today: NaiveDate) -> CommandResult {
    let result = load_config(options).and_then(|config| {
        block_on(async move {
            let pool = open_database(&config).await?;
            let pipeline = build_pipeline(&config, pool.clone())?;
            let mut report = ScheduledReport { date: today.to_string(), ..ScheduledReport::default() };

            match pipeline.cache_job.run(today).await {
                Ok(cache) => report.cache = Some(cache),
                Err(cache_error) => {
                    error!(
                        event_name = "scheduled.cache.failed",
                        error = %cache_error,
                        "cache job failed, continuing with digests"
                    );
                    report.cache_error = Some(cache_error.to_string());
                }
            }

            for cadence in due_cadences(today) {
                match pipeline.orchestrator.run(cadence, today).await {
                    Ok(run) => report.digests.push(run),
                    Err(run_error) => {
                        error!(
                            event_name = "scheduled.digest.aborted",
                            cadence = %cadence,
                            error = %run_error,
                            "digest run aborted"
                        );
                        report
                            .digest_errors
                            .push(CadenceError { cadence, message: run_error.to_string() });
                    }
                }
            }

            if is_first_weekday_of_month(today) {
                if report.digests_clean() {
                    match run_cleanup(&pool, today).await {
                        Ok(cleanup) => report.cleanup = Some(cleanup),
                        Err(cleanup_error) => report.cleanup_error = Some(cleanup_error.to_string()),
                    }
                } else {
                    warn!(
                        event_name = "scheduled.cleanup.skipped",
                        "skipping cleanup because a digest run reported failures"
                    );
                }
            }

            pool.close().await;
            Ok(report)
        })
    });

    match result {
        Ok(report) => {
            info!(
                event_name = "scheduled.finished",
                digests = report.digests.len(),
                clean = report.is_clean(),
                "scheduled run finished"
            );
            let cadences: Vec<String> =
                report.digests.iter().map(|run| run.cadence.to_string()).collect();
            let message = if cadences.is_empty() {
                format!("scheduled run for {today}: no digests due")
            } else {
                format!("scheduled run for {today}: ran {}", cadences.join(", "))
            };
            CommandResult::with_report("scheduled", message, &report, report.is_clean())
        }
        Err(failure) => failure.into_result("scheduled"),
    }
}
