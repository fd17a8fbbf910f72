//! Imgpress daemon entry point.
//!
//! Loads configuration from the environment, wires the watcher, filter,
//! and pipeline together over bounded channels, and runs until a
//! shutdown signal arrives.

use std::sync::Arc;

use {
    anyhow::Context,
    async_channel::bounded,
    tokio::{signal::ctrl_c, spawn},
    tracing::info,
    tracing_subscriber::EnvFilter,
};

use imgpress::{
    CompressionConfig, DirectoryWatcher, EventFilter, Orchestrator, WatcherConfig, error::Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(CompressionConfig::from_env().context("invalid configuration")?);
    config
        .ensure_directories()
        .context("failed to prepare source/output directories")?;
    config.log_banner();

    // Bounded channels keep the watch thread from blocking on slow
    // encodes and make burst backpressure explicit.
    let (event_sender, event_receiver) = bounded(256);
    let (candidate_sender, candidate_receiver) = bounded(16);

    let filter = Arc::new(EventFilter::new(config.clone()));
    let filter_task = spawn(Arc::clone(&filter).run(event_receiver, candidate_sender));

    let orchestrator = Orchestrator::new(config.clone(), filter);
    let pipeline_task = spawn(orchestrator.run(candidate_receiver));

    let watcher = DirectoryWatcher::start(
        &config.source_dir,
        WatcherConfig::from(config.as_ref()),
        event_sender,
    )
    .context("failed to start directory watcher")?;

    info!("waiting for image files...");
    ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("shutdown signal received, stopping");

    drop(watcher);
    filter_task.abort();
    pipeline_task.abort();

    Ok(())
}
