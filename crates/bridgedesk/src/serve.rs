// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `bridgedesk serve` and `bridgedesk replay`.
//!
//! `serve` opens SQLite storage, syncs the configured accounts, builds the
//! [`Pipeline`], starts the webhook gateway and every account, and runs
//! until SIGINT/SIGTERM.

use std::sync::Arc;

use tracing::{error, info, warn};

use bridgedesk_config::model::BridgedeskConfig;
use bridgedesk_core::{BridgeError, StorageAdapter};
use bridgedesk_gateway::start_server;
use bridgedesk_storage::SqliteStorage;
use tokio_util::sync::CancellationToken;

use crate::pipeline::{Pipeline, sync_accounts};
use crate::shutdown;
use crate::transport::UnlinkedConnector;

/// Runs the service until a shutdown signal arrives.
pub async fn run_serve(config: BridgedeskConfig) -> Result<(), BridgeError> {
    init_tracing(&config.service.log_level);
    info!(name = %config.service.name, "starting bridgedesk");

    let storage = open_storage(&config).await?;
    sync_accounts(storage.as_ref(), &config.accounts).await?;

    let cancel = shutdown::install_signal_handler();
    let pipeline = Pipeline::build(
        &config,
        storage.clone(),
        Arc::new(UnlinkedConnector),
        cancel.clone(),
    )?;

    let gateway = if config.gateway.enabled {
        let gateway_config = config.gateway.clone();
        let state = pipeline.gateway_state();
        let gateway_cancel = cancel.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = start_server(&gateway_config, state, gateway_cancel.clone()).await {
                error!(error = %e, "gateway failed");
                // Without the gateway webhook accounts go deaf; stop the process.
                gateway_cancel.cancel();
            }
        }))
    } else {
        info!("webhook gateway disabled");
        None
    };

    pipeline.start_accounts().await?;
    info!("bridgedesk running, waiting for shutdown signal");
    cancel.cancelled().await;

    info!("shutting down");
    pipeline.shutdown().await;
    if let Some(handle) = gateway {
        if let Err(e) = handle.await {
            error!(error = %e, "gateway task panicked");
        }
    }
    close_storage(storage.as_ref()).await;
    info!("bridgedesk stopped");
    Ok(())
}

/// Re-processes up to `limit` audit entries that failed earlier.
///
/// Automation runs for the recovered messages exactly as it would live.
pub async fn run_replay(config: BridgedeskConfig, limit: usize) -> Result<(), BridgeError> {
    init_tracing(&config.service.log_level);

    let storage = open_storage(&config).await?;
    let pipeline = Pipeline::build(
        &config,
        storage.clone(),
        Arc::new(UnlinkedConnector),
        CancellationToken::new(),
    )?;

    let result = pipeline.ingestor.replay_failed(limit).await;
    pipeline.shutdown().await;
    close_storage(storage.as_ref()).await;

    let report = result?;
    println!(
        "replayed: {} stored, {} duplicates, {} status updates, {} still failing",
        report.stored, report.duplicates, report.statuses, report.failed
    );
    Ok(())
}

async fn open_storage(config: &BridgedeskConfig) -> Result<Arc<dyn StorageAdapter>, BridgeError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    info!(path = %config.storage.database_path, "storage initialized");
    Ok(Arc::new(storage))
}

async fn close_storage(storage: &dyn StorageAdapter) {
    if let Err(e) = storage.close().await {
        warn!(error = %e, "storage close failed");
    }
}

/// Initializes the tracing subscriber. `RUST_LOG` overrides `log_level`.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("bridgedesk={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
