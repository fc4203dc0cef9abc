pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tally_core::config::LoadOptions;
use tally_core::Cadence;

#[derive(Debug, Parser)]
#[command(
    name = "tally",
    about = "Tally operator CLI",
    long_about = "Run feedback digests, the daily summary cache, maintenance, and readiness checks.",
    after_help = "Examples:\n  tally scheduled\n  tally digest --cadence weekly --date 2026-10-19\n  tally keygen --valid-days 365\n  tally doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a TOML config file (required to exist when given)")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Build and deliver one cadence's digests to every eligible workspace")]
    Digest {
        #[arg(long, value_parser = parse_cadence)]
        cadence: Cadence,
        #[arg(long, value_parser = parse_date, help = "Run date (YYYY-MM-DD, defaults to today UTC)")]
        date: Option<NaiveDate>,
    },
    #[command(about = "Run the cache job, every digest due today, and monthly cleanup")]
    Scheduled {
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    #[command(about = "Summarize yesterday's comments and refresh issue reports")]
    Cache {
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    #[command(about = "Reset feedback quotas and purge expired data")]
    Cleanup {
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    #[command(about = "Create an account and print its activation code and API key")]
    Keygen {
        #[arg(long, default_value_t = commands::accounts::DEFAULT_VALID_DAYS)]
        valid_days: u32,
    },
    #[command(about = "Store the bot token of a workspace that installed the Slack app")]
    Install {
        #[arg(long)]
        workspace: String,
        #[arg(long)]
        bot_token: String,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, chart tooling, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

fn parse_cadence(value: &str) -> Result<Cadence, String> {
    value.parse().map_err(|error: tally_core::DomainError| error.to_string())
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|error| format!("invalid date `{value}`: {error}"))
}

fn today(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| Utc::now().date_naive())
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions {
        require_file: cli.config.is_some(),
        config_path: cli.config,
        ..LoadOptions::default()
    };

    let result = match cli.command {
        Command::Digest { cadence, date } => commands::digest::run(&options, cadence, today(date)),
        Command::Scheduled { date } => commands::scheduled::run(&options, today(date)),
        Command::Cache { date } => commands::cache::run(&options, today(date)),
        Command::Cleanup { date } => commands::cleanup::run(&options, today(date)),
        Command::Keygen { valid_days } => commands::accounts::keygen(&options, valid_days),
        Command::Install { workspace, bot_token } => {
            commands::accounts::install(&options, &workspace, &bot_token)
        }
        Command::Migrate => commands::migrate::run(&options),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(&options) }
        }
        Command::Doctor { json } => {
            let doctor = commands::doctor::run(&options, json);
            commands::CommandResult {
                exit_code: if doctor.passed { 0 } else { 1 },
                output: doctor.rendered,
            }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
