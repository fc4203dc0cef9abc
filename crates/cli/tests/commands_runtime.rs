use std::env;
use std::sync::{Mutex, OnceLock};

use chrono::NaiveDate;
use serde_json::Value;
use tally_cli::commands::{accounts, cache, cleanup, digest, migrate, scheduled};
use tally_core::config::LoadOptions;
use tally_core::Cadence;

const REQUIRED: &[(&str, &str)] = &[
    ("TALLY_AI_API_URL", "http://127.0.0.1:9/v1/responses"),
    ("TALLY_AI_API_KEY", "sk-test"),
    ("TALLY_AI_MODEL", "gpt-test"),
    ("TALLY_DIGEST_CACHE_INPUT_LIMIT", "50"),
    ("TALLY_DIGEST_INPUT_LIMIT", "20"),
    ("TALLY_PROMPT_DAILY", "Summarize the day"),
    ("TALLY_PROMPT_WEEKLY", "Summarize the week"),
    ("TALLY_PROMPT_MONTHLY", "Summarize the month"),
    ("TALLY_PROMPT_QUARTERLY", "Summarize the quarter"),
    ("TALLY_PROMPT_COMMENT_CACHE", "Summarize these comments"),
    ("TALLY_PROMPT_ISSUE_CACHE", "List the top issues"),
    ("TALLY_SLACK_API_BASE_URL", "http://127.0.0.1:9/api"),
];

fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
}

#[test]
fn migrate_succeeds_against_a_file_database() {
    with_database(|| {
        let result = migrate::run(&LoadOptions::default());
        assert_eq!(result.exit_code, 0, "expected successful migrate run: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn missing_required_settings_fail_with_config_class() {
    with_env(&[("TALLY_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run(&LoadOptions::default());
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
        assert!(payload["message"].as_str().unwrap_or_default().contains("ai.api_key"));
    });
}

#[test]
fn digest_without_eligible_workspaces_is_a_clean_run() {
    with_database(|| {
        let result = digest::run(&LoadOptions::default(), Cadence::Daily, date("2026-10-19"));
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "digest");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["report"]["cadence"], "daily");
        assert_eq!(payload["report"]["workspaces"], 0);
        assert_eq!(payload["report"]["failures"].as_array().map(Vec::len), Some(0));
    });
}

#[test]
fn cache_and_cleanup_report_counts_on_an_empty_database() {
    with_database(|| {
        let cache = cache::run(&LoadOptions::default(), date("2026-10-19"));
        assert_eq!(cache.exit_code, 0, "unexpected output: {}", cache.output);
        let payload = parse_payload(&cache.output);
        assert_eq!(payload["report"]["summaries_stored"], 0);

        let cleanup = cleanup::run(&LoadOptions::default(), date("2026-10-01"));
        assert_eq!(cleanup.exit_code, 0, "unexpected output: {}", cleanup.output);
        let payload = parse_payload(&cleanup.output);
        assert_eq!(payload["command"], "cleanup");
        assert_eq!(payload["report"]["expired_accounts"], 0);
    });
}

#[test]
fn scheduled_on_first_weekday_runs_monthly_and_cleanup() {
    with_database(|| {
        // 2026-10-01 is a Thursday: daily and monthly are due, quarterly waits a day
        let result = scheduled::run(&LoadOptions::default(), date("2026-10-01"));
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

        let payload = parse_payload(&result.output);
        let cadences: Vec<&str> = payload["report"]["digests"]
            .as_array()
            .expect("digests")
            .iter()
            .filter_map(|run| run["cadence"].as_str())
            .collect();
        assert_eq!(cadences, vec!["daily", "monthly"]);
        assert!(payload["report"]["cleanup"].is_object());
        assert!(payload["report"]["cache"].is_object());
    });
}

#[test]
fn explicit_config_path_must_exist() {
    with_env(REQUIRED, || {
        let options = LoadOptions {
            config_path: Some("/nonexistent/tally.toml".into()),
            require_file: true,
            ..LoadOptions::default()
        };
        let result = migrate::run(&options);
        assert_eq!(result.exit_code, 2);
        assert!(parse_payload(&result.output)["message"]
            .as_str()
            .unwrap_or_default()
            .contains("/nonexistent/tally.toml"));
    });
}

#[test]
fn keygen_issues_distinct_unlinked_accounts() {
    with_database(|| {
        let first = parse_payload(&accounts::keygen(&LoadOptions::default(), 30).output);
        let second = parse_payload(&accounts::keygen(&LoadOptions::default(), 30).output);

        assert_eq!(first["status"], "ok", "unexpected output: {first}");
        let report = &first["report"];
        assert!(report["account_id"].as_str().expect("account id").starts_with("acct_"));
        assert!(report["activation_code"].as_str().expect("code").starts_with("TLLY-"));
        assert!(report["api_key"].as_str().expect("api key").starts_with("tally_"));
        assert_ne!(report["api_key"], second["report"]["api_key"]);

        let rejected = accounts::keygen(&LoadOptions::default(), 0);
        assert_eq!(rejected.exit_code, 2);
        assert_eq!(parse_payload(&rejected.output)["error_class"], "invalid_argument");
    });
}

#[test]
fn install_stores_a_bot_token_and_rejects_blanks() {
    with_database(|| {
        let result = accounts::install(&LoadOptions::default(), "T1", "xoxb-test");
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);
        assert_eq!(parse_payload(&result.output)["command"], "install");

        let blank = accounts::install(&LoadOptions::default(), "T1", "  ");
        assert_eq!(blank.exit_code, 2);
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid json")
}

fn with_database(test_fn: impl FnOnce()) {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}", dir.path().join("tally.db").display());
    let mut vars: Vec<(&str, &str)> = REQUIRED.to_vec();
    vars.push(("TALLY_DATABASE_URL", url.as_str()));
    with_env(&vars, test_fn);
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let mut keys: Vec<&str> = REQUIRED.iter().map(|(key, _)| *key).collect();
    keys.extend([
        "TALLY_DATABASE_URL",
        "TALLY_DATABASE_MAX_CONNECTIONS",
        "TALLY_DATABASE_TIMEOUT_SECS",
        "TALLY_AI_TIMEOUT_SECS",
        "TALLY_DIGEST_CHART_DELAY_SECS",
        "TALLY_LOGGING_LEVEL",
        "TALLY_LOGGING_FORMAT",
        "TALLY_LOG_LEVEL",
        "TALLY_LOG_FORMAT",
    ]);

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
