//! Eventide worker application
//!
//! Wires the crates under `crates/` into one process: opens the database,
//! loads the source registry, runs the worker pool and the recurring
//! scheduler, and exposes admin commands over the shared [`state::AppState`].

pub mod commands;
pub mod error;
pub mod handler;
pub mod state;

use eventide_core::{AppConfig, LoggingConfig};
use state::AppState;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins over the configured filter.
pub fn init_tracing(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let (plain, json) = if config.json {
        (None, Some(fmt::layer().json().with_target(true)))
    } else {
        (Some(fmt::layer().with_target(true)), None)
    };

    tracing_subscriber::registry()
        .with(plain)
        .with(json)
        .with(filter)
        .init();
}

/// Run the worker until `shutdown` fires.
///
/// In-flight jobs finish before the database is closed.
pub async fn run(config: AppConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    info!("Starting Eventide v{}", env!("CARGO_PKG_VERSION"));

    let state = AppState::open(config).await?;

    let pool = state.worker_pool();
    let pool_shutdown = shutdown.clone();
    let workers = tokio::spawn(async move { pool.run(pool_shutdown).await });

    let scheduler = if state.config.scheduler.enabled {
        let scheduler = state.recurring_scheduler();
        Some(tokio::spawn(scheduler.run(shutdown.clone())))
    } else {
        info!("recurring scheduler disabled");
        None
    };

    shutdown.cancelled().await;
    info!("shutdown requested");

    if let Some(handle) = scheduler {
        if let Err(e) = handle.await {
            error!(error = %e, "scheduler task panicked");
        }
    }
    match workers.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "worker pool stopped with an error"),
        Err(e) => error!(error = %e, "worker pool task panicked"),
    }

    state.db.close().await;
    info!("Eventide stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let mut config = AppConfig::default();
        config.database.path = Some(dir.path().join("eventide.db"));
        config.scheduler.enabled = false;

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run(config, shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();

        let outcome = tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .expect("run returns after shutdown")
            .expect("task joins");
        assert!(outcome.is_ok());
        assert!(dir.path().join("eventide.db").exists());
    }
}
