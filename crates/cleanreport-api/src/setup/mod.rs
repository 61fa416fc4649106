//! Application setup and initialization

pub mod routes;
pub mod server;

use crate::state::AppState;
use anyhow::{Context, Result};
use cleanreport_core::Config;
use cleanreport_storage::{create_sink, Sink};
use cleanreport_worker::{
    FileOutbox, ForwardQueue, ForwardQueueConfig, MemoryOutbox, Outbox, StatusStore,
};
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    config
        .validate()
        .context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(config.log_json())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.environment(),
        sink = %config.sink_backend(),
        forward_mode = %config.forward_mode(),
        "Configuration loaded and validated successfully"
    );

    let sink = create_sink(&config)
        .await
        .context("Failed to initialize sink")?;
    let outbox = setup_outbox(&config).await?;

    let state = build_state(config.clone(), sink, outbox);

    let replayed = state
        .queue
        .replay_pending()
        .await
        .context("Failed to replay pending forward jobs")?;
    if replayed > 0 {
        tracing::info!(jobs = replayed, "Resumed forwarding of pending submissions");
    }

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}

/// File-backed outbox when `OUTBOX_DIR` is set, otherwise in memory.
async fn setup_outbox(config: &Config) -> Result<Arc<dyn Outbox>> {
    match config.outbox_dir() {
        Some(dir) => {
            let outbox = FileOutbox::new(dir)
                .await
                .with_context(|| format!("Failed to open outbox at {}", dir))?;
            Ok(Arc::new(outbox))
        }
        None => {
            tracing::warn!("OUTBOX_DIR not set, pending forwards will not survive a restart");
            Ok(Arc::new(MemoryOutbox::new()))
        }
    }
}

/// Wire the forward queue to `sink` and `outbox` and spawn its workers.
pub fn build_state(config: Config, sink: Arc<dyn Sink>, outbox: Arc<dyn Outbox>) -> Arc<AppState> {
    let statuses = StatusStore::new(config.status_cache_size());
    let queue = ForwardQueue::new(
        sink,
        outbox,
        statuses,
        ForwardQueueConfig::from_config(&config),
    );
    Arc::new(AppState::new(config, queue))
}
