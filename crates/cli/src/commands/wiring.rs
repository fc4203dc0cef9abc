//! Builds the digest pipeline from configuration.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use tally_core::config::{AppConfig, LoadOptions};
use tally_core::digest::{
    CacheSettings, ChartGenerator, DailyCacheJob, DigestOrchestrator, DigestSettings,
};
use tally_db::{connect_from_config, migrations, DbPool, SqlDigestStore};
use tally_gateway::{PyxplotChartRenderer, ResponsesSummarizer};
use tally_slack::{SlackDigestPublisher, SlackWebClient};

use crate::commands::{exit, CommandFailure};
use crate::logging::init_logging;

pub struct Pipeline {
    pub orchestrator: DigestOrchestrator,
    pub cache_job: DailyCacheJob,
}

pub fn load_config(options: &LoadOptions) -> Result<AppConfig, CommandFailure> {
    let config = AppConfig::load(options.clone()).map_err(|error| {
        CommandFailure::new("config_validation", format!("configuration issue: {error}"), exit::CONFIG)
    })?;
    init_logging(&config.logging);
    Ok(config)
}

/// Runs `task` on a fresh current-thread runtime.
pub fn block_on<F, T>(task: F) -> Result<T, CommandFailure>
where
    F: Future<Output = Result<T, CommandFailure>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(
        |error| {
            CommandFailure::new(
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                exit::RUNTIME,
            )
        },
    )?;
    runtime.block_on(task)
}

/// Connects and brings the schema up to date.
pub async fn open_database(config: &AppConfig) -> Result<DbPool, CommandFailure> {
    let pool = connect_from_config(&config.database).await.map_err(|error| {
        CommandFailure::new("db_connectivity", error.to_string(), exit::DATABASE)
    })?;
    migrations::run_pending(&pool)
        .await
        .map_err(|error| CommandFailure::new("migration", error.to_string(), exit::MIGRATION))?;
    Ok(pool)
}

pub fn build_pipeline(config: &AppConfig, pool: DbPool) -> Result<Pipeline, CommandFailure> {
    assemble(config, pool)
        .map_err(|error| CommandFailure::new("wiring", format!("{error:#}"), exit::WIRING))
}

fn assemble(config: &AppConfig, pool: DbPool) -> anyhow::Result<Pipeline> {
    let store = Arc::new(SqlDigestStore::new(pool));
    let summarizer = Arc::new(
        ResponsesSummarizer::from_config(&config.ai).context("building summarizer client")?,
    );
    let slack = SlackWebClient::from_config(&config.slack).context("building slack client")?;
    let publisher = Arc::new(SlackDigestPublisher::new(slack));
    let charts = ChartGenerator::new(
        Arc::new(PyxplotChartRenderer::from_config(&config.digest)),
        publisher.clone(),
    );

    let orchestrator = DigestOrchestrator::new(
        store.clone(),
        summarizer.clone(),
        publisher,
        DigestSettings::from_config(&config.digest),
    )
    .with_charts(charts);
    let cache_job = DailyCacheJob::new(store, summarizer, CacheSettings::from_config(&config.digest));

    Ok(Pipeline { orchestrator, cache_job })
}
