// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::routing::get;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use bridgedesk_config::model::GatewayConfig;
use bridgedesk_connection::SessionRegistry;
use bridgedesk_core::types::IngestItem;
use bridgedesk_core::{BridgeError, StorageAdapter};

use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Account lookup for verify tokens and webhook secrets.
    pub storage: Arc<dyn StorageAdapter>,
    /// Queue drained by the ingest worker.
    pub ingest_tx: mpsc::Sender<IngestItem>,
    /// Live paired sessions, reported by the health endpoint.
    pub sessions: SessionRegistry,
    pub start_time: Instant,
}

impl GatewayState {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        ingest_tx: mpsc::Sender<IngestItem>,
        sessions: SessionRegistry,
    ) -> Self {
        Self {
            storage,
            ingest_tx,
            sessions,
            start_time: Instant::now(),
        }
    }
}

/// Routes:
/// - GET /health
/// - GET /webhooks/{platform} (subscription handshake)
/// - POST /webhooks/{platform} (event delivery)
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route(
            "/webhooks/{platform}",
            get(handlers::verify_subscription).post(handlers::receive_webhook),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds `host:port` and serves until `cancel` fires.
pub async fn start_server(
    config: &GatewayConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), BridgeError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| BridgeError::Configuration(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| BridgeError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway stopped");
    Ok(())
}
