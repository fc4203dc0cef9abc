use chrono::NaiveDate;
use tally_core::config::LoadOptions;
use tally_db::run_cleanup;

use crate::commands::wiring::{block_on, load_config, open_database};
use crate::commands::{exit, CommandFailure, CommandResult};

pub fn run(options: &LoadOptions, today: NaiveDate) -> CommandResult {
    let result = load_config(options).and_then(|config| {
        block_on(async move {
            let pool = open_database(&config).await?;
            let report = run_cleanup(&pool, today).await.map_err(|error| {
                CommandFailure::new("cleanup", error.to_string(), exit::ABORTED)
            })?;
            pool.close().await;
            Ok(report)
        })
    });

    match result {
        Ok(report) => CommandResult::with_report(
            "cleanup",
            format!(
                "removed {} feedback rows, {} summaries and {} expired accounts",
                report.feedback_deleted, report.summaries_deleted, report.expired_accounts
            ),
            &report,
            true,
        ),
        Err(failure) => failure.into_result("cleanup"),
    }
}
