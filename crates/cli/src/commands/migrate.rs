use tally_core::config::LoadOptions;

use crate::commands::wiring::{block_on, load_config, open_database};
use crate::commands::CommandResult;

pub fn run(options: &LoadOptions) -> CommandResult {
    let result = load_config(options).and_then(|config| {
        block_on(async move {
            let pool = open_database(&config).await?;
            pool.close().await;
            Ok(())
        })
    });

    match result {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err(failure) => failure.into_result("migrate"),
    }
}
