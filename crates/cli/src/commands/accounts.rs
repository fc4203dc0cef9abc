//! Operator commands that provision accounts and Slack installations.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tally_core::config::LoadOptions;
use tally_core::Account;
use tally_db::{
    AccountRepository, InstallationRepository, SqlAccountRepository, SqlInstallationRepository,
};

use crate::commands::wiring::{block_on, load_config, open_database};
use crate::commands::{exit, CommandFailure, CommandResult};

pub const DEFAULT_VALID_DAYS: u32 = 365;

#[derive(Debug, Serialize)]
pub struct IssuedAccount {
    pub account_id: String,
    pub activation_code: String,
    pub api_key: String,
    pub expires_at: DateTime<Utc>,
}

/// Stores a fresh unlinked account and prints its activation code and API key.
pub fn keygen(options: &LoadOptions, valid_days: u32) -> CommandResult {
    if valid_days == 0 {
        return CommandFailure::new(
            "invalid_argument",
            "--valid-days must be at least 1",
            exit::CONFIG,
        )
        .into_result("keygen");
    }

    let result = load_config(options).and_then(|config| {
        block_on(async move {
            let pool = open_database(&config).await?;
            let account = Account::issue(
                Utc::now(),
                Duration::days(i64::from(valid_days)),
                &mut rand::thread_rng(),
            );
            SqlAccountRepository::new(pool.clone()).create(&account).await.map_err(|error| {
                CommandFailure::new("keygen", error.to_string(), exit::ABORTED)
            })?;
            pool.close().await;
            Ok(account)
        })
    });

    match result {
        Ok(account) => CommandResult::with_report(
            "keygen",
            format!(
                "issued account {} valid until {}",
                account.account_id,
                account.expires_at.date_naive()
            ),
            &IssuedAccount {
                account_id: account.account_id,
                activation_code: account.activation_code,
                api_key: account.api_key,
                expires_at: account.expires_at,
            },
            true,
        ),
        Err(failure) => failure.into_result("keygen"),
    }
}

/// Records the bot token a workspace granted when installing the app.
pub fn install(options: &LoadOptions, workspace: &str, bot_token: &str) -> CommandResult {
    if workspace.trim().is_empty() || bot_token.trim().is_empty() {
        return CommandFailure::new(
            "invalid_argument",
            "--workspace and --bot-token must not be blank",
            exit::CONFIG,
        )
        .into_result("install");
    }

    let result = load_config(options).and_then(|config| {
        block_on(async move {
            let pool = open_database(&config).await?;
            SqlInstallationRepository::new(pool.clone())
                .save(workspace.trim(), bot_token.trim())
                .await
                .map_err(|error| CommandFailure::new("install", error.to_string(), exit::ABORTED))?;
            pool.close().await;
            Ok(())
        })
    });

    match result {
        Ok(()) => CommandResult::success(
            "install",
            format!("bot token stored for workspace {}", workspace.trim()),
        ),
        Err(failure) => failure.into_result("install"),
    }
}
