use chrono::NaiveDate;
use tally_core::config::LoadOptions;
use tally_core::Cadence;
use tracing::info;

use crate::commands::wiring::{block_on, build_pipeline, load_config, open_database};
use crate::commands::{exit, CommandFailure, CommandResult};

pub fn run(options: &LoadOptions, cadence: Cadence, today: NaiveDate) -> CommandResult {
    let command = "digest";
    let result = load_config(options).and_then(|config| {
        block_on(async move {
            let pool = open_database(&config).await?;
            let pipeline = build_pipeline(&config, pool.clone())?;
            let report = pipeline.orchestrator.run(cadence, today).await.map_err(|error| {
                CommandFailure::new("run_aborted", error.to_string(), exit::ABORTED)
            })?;
            pool.close().await;
            Ok(report)
        })
    });

    match result {
        Ok(report) => {
            info!(
                event_name = "cli.digest.finished",
                cadence = %cadence,
                delivered = report.delivered,
                failures = report.failures.len(),
                "digest command finished"
            );
            CommandResult::with_report(
                command,
                format!(
                    "{cadence} digest for {today}: {} of {} workspaces delivered",
                    report.delivered, report.workspaces
                ),
                &report,
                report.is_clean(),
            )
        }
        Err(failure) => failure.into_result(command),
    }
}
