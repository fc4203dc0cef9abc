use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use tally_core::config::{AppConfig, LoadOptions};
use toml::Value;

struct Field {
    key: &'static str,
    env_key: Option<&'static str>,
    value: String,
}

fn field(key: &'static str, env_key: &'static str, value: impl ToString) -> Field {
    Field { key, env_key: Some(env_key), value: value.to_string() }
}

pub fn run(options: &LoadOptions) -> String {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let prompts = &config.digest.prompts;
    let optional_path = |path: &Option<PathBuf>| {
        path.as_ref().map(|path| path.display().to_string()).unwrap_or_else(|| "<PATH>".to_string())
    };
    let fields = vec![
        field("database.url", "TALLY_DATABASE_URL", &config.database.url),
        field("database.max_connections", "TALLY_DATABASE_MAX_CONNECTIONS", config.database.max_connections),
        field("database.timeout_secs", "TALLY_DATABASE_TIMEOUT_SECS", config.database.timeout_secs),
        field("slack.api_base_url", "TALLY_SLACK_API_BASE_URL", &config.slack.api_base_url),
        field("ai.api_url", "TALLY_AI_API_URL", &config.ai.api_url),
        field("ai.api_key", "TALLY_AI_API_KEY", redact_secret(config.ai.api_key.expose_secret())),
        field("ai.model", "TALLY_AI_MODEL", &config.ai.model),
        field("ai.timeout_secs", "TALLY_AI_TIMEOUT_SECS", config.ai.timeout_secs),
        field("digest.cache_input_limit", "TALLY_DIGEST_CACHE_INPUT_LIMIT", config.digest.cache_input_limit),
        field("digest.digest_input_limit", "TALLY_DIGEST_INPUT_LIMIT", config.digest.digest_input_limit),
        field("digest.chart_delay_secs", "TALLY_DIGEST_CHART_DELAY_SECS", config.digest.chart_delay_secs),
        field("digest.pyxplot_path", "TALLY_DIGEST_PYXPLOT_PATH", optional_path(&config.digest.pyxplot_path)),
        field("digest.mogrify_path", "TALLY_DIGEST_MOGRIFY_PATH", optional_path(&config.digest.mogrify_path)),
        field("digest.prompts.daily", "TALLY_PROMPT_DAILY", prompt_preview(&prompts.daily)),
        field("digest.prompts.weekly", "TALLY_PROMPT_WEEKLY", prompt_preview(&prompts.weekly)),
        field("digest.prompts.monthly", "TALLY_PROMPT_MONTHLY", prompt_preview(&prompts.monthly)),
        field("digest.prompts.quarterly", "TALLY_PROMPT_QUARTERLY", prompt_preview(&prompts.quarterly)),
        field("digest.prompts.comment_cache", "TALLY_PROMPT_COMMENT_CACHE", prompt_preview(&prompts.comment_cache)),
        field("digest.prompts.issue_cache", "TALLY_PROMPT_ISSUE_CACHE", prompt_preview(&prompts.issue_cache)),
        field("ingest.prompt_count_limit", "TALLY_INGEST_PROMPT_COUNT_LIMIT", config.ingest.prompt_count_limit),
        field(
            "ingest.monthly_feedback_limit",
            "TALLY_INGEST_MONTHLY_FEEDBACK_LIMIT",
            config.ingest.monthly_feedback_limit,
        ),
        field("server.bind_address", "TALLY_SERVER_BIND_ADDRESS", &config.server.bind_address),
        field("server.port", "TALLY_SERVER_PORT", config.server.port),
        field(
            "server.graceful_shutdown_secs",
            "TALLY_SERVER_GRACEFUL_SHUTDOWN_SECS",
            config.server.graceful_shutdown_secs,
        ),
        field("logging.level", "TALLY_LOGGING_LEVEL", &config.logging.level),
        Field {
            key: "logging.format",
            env_key: Some("TALLY_LOGGING_FORMAT"),
            value: format!("{:?}", config.logging.format).to_lowercase(),
        },
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for entry in fields {
        let source = field_source(
            entry.key,
            entry.env_key,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(entry.key, &entry.value, source));
    }
    lines.join("\n")
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }
    ["tally.toml", "config/tally.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

fn prompt_preview(prompt: &str) -> String {
    let flattened = prompt.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= 40 {
        return format!("{flattened:?}");
    }
    let head: String = flattened.chars().take(40).collect();
    format!("{head:?}…")
}

#[cfg(test)]
mod tests {
    use super::{prompt_preview, redact_secret};

    #[test]
    fn secrets_keep_only_their_prefix() {
        assert_eq!(redact_secret("sk-live-abcdef"), "sk-***");
        assert_eq!(redact_secret("opaque"), "<redacted>");
        assert_eq!(redact_secret("  "), "<empty>");
    }

    #[test]
    fn long_prompts_are_truncated_on_one_line() {
        assert_eq!(prompt_preview("Summarize\n  the comments"), "\"Summarize the comments\"");
        let long = "word ".repeat(20);
        assert!(prompt_preview(&long).ends_with("\"…"));
    }
}
