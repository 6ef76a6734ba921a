//! `eventide [CONFIG_PATH]`
//!
//! Runs the ingestion worker until Ctrl-C.

use anyhow::Context;
use eventide_app::{init_tracing, run};
use eventide_core::AppConfig;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = AppConfig::load_with_env(config_path.as_deref()).context("load configuration")?;

    init_tracing(&config.logging);
    if let Some(path) = &config_path {
        info!(path = %path.display(), "configuration loaded");
    }

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl-C"),
            Err(e) => warn!(error = %e, "failed to listen for Ctrl-C"),
        }
        signal.cancel();
    });

    run(config, shutdown).await
}
