use chrono::NaiveDate;
use tally_core::config::LoadOptions;

use crate::commands::wiring::{block_on, build_pipeline, load_config, open_database};
use crate::commands::{exit, CommandFailure, CommandResult};

pub fn run(options: &LoadOptions, today: NaiveDate) -> CommandResult {
    let result = load_config(options).and_then(|config| {
        block_on(async move {
            let pool = open_database(&config).await?;
            let pipeline = build_pipeline(&config, pool.clone())?;
            let report = pipeline.cache_job.run(today).await.map_err(|error| {
                CommandFailure::new("run_aborted", error.to_string(), exit::ABORTED)
            })?;
            pool.close().await;
            Ok(report)
        })
    });

    match result {
        Ok(report) => CommandResult::with_report(
            "cache",
            format!(
                "cached {} summaries and {} issue reports for {today}",
                report.summaries_stored, report.issue_reports_stored
            ),
            &report,
            report.is_clean(),
        ),
        Err(failure) => failure.into_result("cache"),
    }
}
