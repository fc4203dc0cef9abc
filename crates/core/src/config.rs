use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub slack: SlackConfig,
    pub ai: AiConfig,
    pub digest: DigestConfig,
    pub ingest: IngestConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub api_base_url: String,
}

#[derive(Clone, Debug)]
pub struct AiConfig {
    pub api_url: String,
    pub api_key: SecretString,
    pub model: String,
    pub timeout_secs: u64,
}

/// Digest pipeline settings. Prompts and row limits have no usable
/// defaults and must be supplied by the deployment.
#[derive(Clone, Debug)]
pub struct DigestConfig {
    pub cache_input_limit: usize,
    pub digest_input_limit: usize,
    pub prompts: DigestPrompts,
    pub chart_delay_secs: u64,
    pub pyxplot_path: Option<PathBuf>,
    pub mogrify_path: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct DigestPrompts {
    pub daily: String,
    pub weekly: String,
    pub monthly: String,
    pub quarterly: String,
    pub comment_cache: String,
    pub issue_cache: String,
}

#[derive(Clone, Debug)]
pub struct IngestConfig {
    pub prompt_count_limit: u32,
    pub monthly_feedback_limit: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub ai_model: Option<String>,
    pub chart_delay_secs: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://tally.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            slack: SlackConfig { api_base_url: "https://slack.com/api".to_string() },
            ai: AiConfig {
                api_url: "https://api.openai.com/v1/responses".to_string(),
                api_key: String::new().into(),
                model: String::new(),
                timeout_secs: 120,
            },
            digest: DigestConfig {
                cache_input_limit: 0,
                digest_input_limit: 0,
                prompts: DigestPrompts::default(),
                chart_delay_secs: 10,
                pyxplot_path: None,
                mogrify_path: None,
            },
            ingest: IngestConfig { prompt_count_limit: 100, monthly_feedback_limit: 10_000 },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("tally.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(slack) = patch.slack {
            if let Some(api_base_url) = slack.api_base_url {
                self.slack.api_base_url = api_base_url;
            }
        }

        if let Some(ai) = patch.ai {
            if let Some(api_url) = ai.api_url {
                self.ai.api_url = api_url;
            }
            if let Some(api_key) = ai.api_key {
                self.ai.api_key = secret_value(api_key);
            }
            if let Some(model) = ai.model {
                self.ai.model = model;
            }
            if let Some(timeout_secs) = ai.timeout_secs {
                self.ai.timeout_secs = timeout_secs;
            }
        }

        if let Some(digest) = patch.digest {
            if let Some(limit) = digest.cache_input_limit {
                self.digest.cache_input_limit = limit;
            }
            if let Some(limit) = digest.digest_input_limit {
                self.digest.digest_input_limit = limit;
            }
            if let Some(delay) = digest.chart_delay_secs {
                self.digest.chart_delay_secs = delay;
            }
            if let Some(path) = digest.pyxplot_path {
                self.digest.pyxplot_path = Some(path);
            }
            if let Some(path) = digest.mogrify_path {
                self.digest.mogrify_path = Some(path);
            }
            if let Some(prompts) = digest.prompts {
                let target = &mut self.digest.prompts;
                let fields = [
                    (prompts.daily, &mut target.daily),
                    (prompts.weekly, &mut target.weekly),
                    (prompts.monthly, &mut target.monthly),
                    (prompts.quarterly, &mut target.quarterly),
                    (prompts.comment_cache, &mut target.comment_cache),
                    (prompts.issue_cache, &mut target.issue_cache),
                ];
                for (value, slot) in fields {
                    if let Some(value) = value {
                        *slot = value;
                    }
                }
            }
        }

        if let Some(ingest) = patch.ingest {
            if let Some(limit) = ingest.prompt_count_limit {
                self.ingest.prompt_count_limit = limit;
            }
            if let Some(limit) = ingest.monthly_feedback_limit {
                self.ingest.monthly_feedback_limit = limit;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("TALLY_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("TALLY_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("TALLY_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("TALLY_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("TALLY_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TALLY_SLACK_API_BASE_URL") {
            self.slack.api_base_url = value;
        }

        if let Some(value) = read_env("TALLY_AI_API_URL") {
            self.ai.api_url = value;
        }
        if let Some(value) = read_env("TALLY_AI_API_KEY") {
            self.ai.api_key = secret_value(value);
        }
        if let Some(value) = read_env("TALLY_AI_MODEL") {
            self.ai.model = value;
        }
        if let Some(value) = read_env("TALLY_AI_TIMEOUT_SECS") {
            self.ai.timeout_secs = parse_u64("TALLY_AI_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TALLY_DIGEST_CACHE_INPUT_LIMIT") {
            self.digest.cache_input_limit = parse_usize("TALLY_DIGEST_CACHE_INPUT_LIMIT", &value)?;
        }
        if let Some(value) = read_env("TALLY_DIGEST_INPUT_LIMIT") {
            self.digest.digest_input_limit = parse_usize("TALLY_DIGEST_INPUT_LIMIT", &value)?;
        }
        if let Some(value) = read_env("TALLY_DIGEST_CHART_DELAY_SECS") {
            self.digest.chart_delay_secs = parse_u64("TALLY_DIGEST_CHART_DELAY_SECS", &value)?;
        }
        if let Some(value) = read_env("TALLY_DIGEST_PYXPLOT_PATH") {
            self.digest.pyxplot_path = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("TALLY_DIGEST_MOGRIFY_PATH") {
            self.digest.mogrify_path = Some(PathBuf::from(value));
        }

        let prompts = &mut self.digest.prompts;
        let prompt_vars = [
            ("TALLY_PROMPT_DAILY", &mut prompts.daily),
            ("TALLY_PROMPT_WEEKLY", &mut prompts.weekly),
            ("TALLY_PROMPT_MONTHLY", &mut prompts.monthly),
            ("TALLY_PROMPT_QUARTERLY", &mut prompts.quarterly),
            ("TALLY_PROMPT_COMMENT_CACHE", &mut prompts.comment_cache),
            ("TALLY_PROMPT_ISSUE_CACHE", &mut prompts.issue_cache),
        ];
        for (key, slot) in prompt_vars {
            if let Some(value) = read_env(key) {
                *slot = value;
            }
        }

        if let Some(value) = read_env("TALLY_INGEST_PROMPT_COUNT_LIMIT") {
            self.ingest.prompt_count_limit = parse_u32("TALLY_INGEST_PROMPT_COUNT_LIMIT", &value)?;
        }
        if let Some(value) = read_env("TALLY_INGEST_MONTHLY_FEEDBACK_LIMIT") {
            self.ingest.monthly_feedback_limit =
                parse_u32("TALLY_INGEST_MONTHLY_FEEDBACK_LIMIT", &value)?;
        }

        if let Some(value) = read_env("TALLY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("TALLY_SERVER_PORT") {
            self.server.port = parse_u16("TALLY_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("TALLY_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("TALLY_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("TALLY_LOGGING_LEVEL").or_else(|| read_env("TALLY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("TALLY_LOGGING_FORMAT").or_else(|| read_env("TALLY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(ai_model) = overrides.ai_model {
            self.ai.model = ai_model;
        }
        if let Some(delay) = overrides.chart_delay_secs {
            self.digest.chart_delay_secs = delay;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_slack(&self.slack)?;
        validate_ai(&self.ai)?;
        validate_digest(&self.digest)?;
        validate_ingest(&self.ingest)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

impl DigestPrompts {
    fn named(&self) -> [(&'static str, &str); 6] {
        [
            ("daily", self.daily.as_str()),
            ("weekly", self.weekly.as_str()),
            ("monthly", self.monthly.as_str()),
            ("quarterly", self.quarterly.as_str()),
            ("comment_cache", self.comment_cache.as_str()),
            ("issue_cache", self.issue_cache.as_str()),
        ]
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("tally.toml"), PathBuf::from("config/tally.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    let base = slack.api_base_url.trim();
    if !base.starts_with("http://") && !base.starts_with("https://") {
        return Err(ConfigError::Validation(
            "slack.api_base_url must start with http:// or https://".to_string(),
        ));
    }
    Ok(())
}

fn validate_ai(ai: &AiConfig) -> Result<(), ConfigError> {
    if !ai.api_url.starts_with("http://") && !ai.api_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "ai.api_url must start with http:// or https://".to_string(),
        ));
    }
    if ai.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "ai.api_key is required (set TALLY_AI_API_KEY)".to_string(),
        ));
    }
    if ai.model.trim().is_empty() {
        return Err(ConfigError::Validation("ai.model is required (set TALLY_AI_MODEL)".to_string()));
    }
    if ai.timeout_secs == 0 || ai.timeout_secs > 600 {
        return Err(ConfigError::Validation("ai.timeout_secs must be in range 1..=600".to_string()));
    }
    Ok(())
}

fn validate_digest(digest: &DigestConfig) -> Result<(), ConfigError> {
    if digest.cache_input_limit == 0 {
        return Err(ConfigError::Validation(
            "digest.cache_input_limit is required and must be greater than zero".to_string(),
        ));
    }
    if digest.digest_input_limit == 0 {
        return Err(ConfigError::Validation(
            "digest.digest_input_limit is required and must be greater than zero".to_string(),
        ));
    }

    for (name, value) in digest.prompts.named() {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "digest.prompts.{name} is required (set TALLY_PROMPT_{})",
                name.to_ascii_uppercase()
            )));
        }
    }

    if digest.chart_delay_secs > 300 {
        return Err(ConfigError::Validation(
            "digest.chart_delay_secs must be at most 300".to_string(),
        ));
    }

    Ok(())
}

fn validate_ingest(ingest: &IngestConfig) -> Result<(), ConfigError> {
    if ingest.prompt_count_limit == 0 || ingest.monthly_feedback_limit == 0 {
        return Err(ConfigError::Validation(
            "ingest.prompt_count_limit and ingest.monthly_feedback_limit must be greater than zero"
                .to_string(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    slack: Option<SlackPatch>,
    ai: Option<AiPatch>,
    digest: Option<DigestPatch>,
    ingest: Option<IngestPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    api_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AiPatch {
    api_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DigestPatch {
    cache_input_limit: Option<usize>,
    digest_input_limit: Option<usize>,
    chart_delay_secs: Option<u64>,
    pyxplot_path: Option<PathBuf>,
    mogrify_path: Option<PathBuf>,
    prompts: Option<PromptsPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct PromptsPatch {
    daily: Option<String>,
    weekly: Option<String>,
    monthly: Option<String>,
    quarterly: Option<String>,
    comment_cache: Option<String>,
    issue_cache: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct IngestPatch {
    prompt_count_limit: Option<u32>,
    monthly_feedback_limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
