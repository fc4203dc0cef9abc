use std::sync::Arc;

use tally_core::config::{AppConfig, ConfigError, LoadOptions};
use tally_db::{
    connect_from_config, migrations, DbPool, SqlAccountRepository, SqlFeedbackRepository,
    SqlInstallationRepository,
};
use tally_slack::{SlackApiError, SlackWebClient};
use thiserror::Error;
use tracing::info;

use crate::feedback::IngestState;
use crate::filter_state::{FilterStateStore, InMemoryFilterStore, SystemClock};
use crate::interactions::{AppHomeService, InteractionState};
use crate::refresh::{LoggingFailureSink, RefreshDispatcher, DEFAULT_QUEUE_CAPACITY};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub ingest: IngestState,
    pub interactions: InteractionState,
    pub filters: Arc<dyn FilterStateStore>,
    pub refresh: RefreshDispatcher,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("slack client setup failed: {0}")]
    Slack(#[source] SlackApiError),
}

/// Loads and validates the config, then starts logging before anything else runs.
pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    crate::init_logging(&config.logging);
    bootstrap_with_config(config).await
}

/// Connects, migrates, and wires the request handlers. Must run inside a
/// tokio runtime since it spawns the refresh worker.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "server.bootstrap.start", "starting application bootstrap");

    let db_pool =
        connect_from_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "server.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "server.bootstrap.migrations_applied", "database migrations applied");

    let slack = SlackWebClient::from_config(&config.slack).map_err(BootstrapError::Slack)?;
    let filters: Arc<dyn FilterStateStore> = Arc::new(InMemoryFilterStore::default());
    let feedback = Arc::new(SqlFeedbackRepository::new(db_pool.clone()));
    let accounts = Arc::new(SqlAccountRepository::new(db_pool.clone()));

    let app_home = Arc::new(AppHomeService {
        feedback: feedback.clone(),
        accounts: accounts.clone(),
        installations: Arc::new(SqlInstallationRepository::new(db_pool.clone())),
        filters: filters.clone(),
        views: Arc::new(slack),
        clock: Arc::new(SystemClock),
        prompt_limit: config.ingest.prompt_count_limit,
    });
    let refresh = RefreshDispatcher::spawn(
        app_home.clone(),
        Arc::new(LoggingFailureSink),
        DEFAULT_QUEUE_CAPACITY,
    );

    let ingest = IngestState { accounts, feedback, limits: config.ingest.clone() };
    let interactions = InteractionState { app_home, refresh: refresh.handle() };

    Ok(Application { config, db_pool, ingest, interactions, filters, refresh })
}
