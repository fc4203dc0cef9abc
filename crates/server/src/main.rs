mod app;
mod bootstrap;
mod feedback;
mod filter_state;
mod health;
mod interactions;
mod refresh;

use std::time::Duration;

use anyhow::{Context, Result};
use tally_core::config::{LoadOptions, LogFormat, LoggingConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Later calls keep the first subscriber.
pub(crate) fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    let _ = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let app = bootstrap::bootstrap(LoadOptions::default()).await?;

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("could not bind {address}"))?;
    let sweeper =
        filter_state::spawn_sweeper(app.filters.clone(), filter_state::SWEEP_INTERVAL);
    let router = app::router(app.db_pool.clone(), app.ingest.clone(), app.interactions.clone());

    info!(event_name = "server.started", bind_address = %address, "tally-server listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(wait_for_shutdown())
        .await
        .context("http server terminated unexpectedly")?;
    info!(event_name = "server.stopping", "tally-server stopping");

    sweeper.abort();
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(grace, app.refresh.shutdown()).await {
        Ok(stats) => info!(
            event_name = "server.refresh.stopped",
            processed = stats.processed,
            failed = stats.failed,
            "refresh queue drained"
        ),
        Err(_) => warn!(
            event_name = "server.refresh.drain_timeout",
            grace_secs = grace.as_secs(),
            "refresh queue not drained before the grace period ended"
        ),
    }
    app.db_pool.close().await;

    Ok(())
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(event_name = "server.signal.unavailable", error = %error, "ctrl-c handler failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                warn!(event_name = "server.signal.unavailable", error = %error, "SIGTERM handler failed");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
