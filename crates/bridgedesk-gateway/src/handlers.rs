// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use bridgedesk_core::types::{Account, ConnectionState, HealthStatus, IngestItem, Platform};
use bridgedesk_core::{BridgeError, PluginAdapter};
use bridgedesk_ingest::{SIGNATURE_HEADER, verify_signature};

use crate::server::GatewayState;

/// Acknowledgement body the platforms expect.
pub const EVENT_RECEIVED: &str = "EVENT_RECEIVED";

/// Query of the subscription handshake.
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub storage: String,
    pub sessions: Vec<SessionHealth>,
}

#[derive(Debug, Serialize)]
pub struct SessionHealth {
    pub account_id: String,
    pub state: ConnectionState,
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Token-based accounts of the platform named by the path segment.
///
/// Inbound delivery does not depend on the active slot, which only picks
/// the outbound account. The active account, when token-based, is listed
/// first.
async fn webhook_accounts(
    state: &GatewayState,
    platform: &str,
) -> Result<Vec<Account>, Response> {
    let platform: Platform = platform
        .parse()
        .map_err(|_| error(StatusCode::NOT_FOUND, format!("unknown platform {platform}")))?;
    let lookup = async {
        let active = state.storage.active_account(platform).await?;
        let accounts = state.storage.list_accounts().await?;
        Ok::<_, BridgeError>((active, accounts))
    };
    let (active, accounts) = lookup.await.map_err(|e| {
        warn!(platform = %platform, error = %e, "webhook account lookup failed");
        error(StatusCode::INTERNAL_SERVER_ERROR, "storage unavailable")
    })?;

    let active_id = active.map(|a| a.id);
    let mut accounts: Vec<Account> = accounts
        .into_iter()
        .filter(|a| a.platform == platform && a.kind.is_token_based())
        .collect();
    if accounts.is_empty() {
        return Err(error(
            StatusCode::NOT_FOUND,
            format!("no webhook account is configured for {platform}"),
        ));
    }
    accounts.sort_by_key(|a| Some(&a.id) != active_id.as_ref());
    Ok(accounts)
}

/// Business ids a delivery is addressed to: `entry[].id` (page or business
/// account) and `entry[].changes[].value.metadata.phone_number_id`.
fn routing_ids(payload: &serde_json::Value) -> Vec<&str> {
    let mut ids = Vec::new();
    for entry in payload["entry"].as_array().into_iter().flatten() {
        ids.extend(entry["id"].as_str());
        for change in entry["changes"].as_array().into_iter().flatten() {
            ids.extend(change["value"]["metadata"]["phone_number_id"].as_str());
        }
    }
    ids
}

/// The account a delivery is addressed to, else the first candidate.
fn receiving_account(accounts: Vec<Account>, payload: &serde_json::Value) -> Option<Account> {
    let ids = routing_ids(payload);
    let addressed = accounts.iter().position(|a| {
        [a.phone_number_id.as_deref(), a.page_id.as_deref()]
            .into_iter()
            .flatten()
            .any(|own| ids.iter().any(|id| *id == own))
    });
    accounts.into_iter().nth(addressed.unwrap_or(0))
}

/// GET /webhooks/{platform}
///
/// Echoes `hub.challenge` when `hub.mode=subscribe` and the token matches
/// the verify token of one of the platform's webhook accounts.
pub async fn verify_subscription(
    State(state): State<GatewayState>,
    Path(platform): Path<String>,
    Query(query): Query<VerifyQuery>,
) -> Response {
    let accounts = match webhook_accounts(&state, &platform).await {
        Ok(accounts) => accounts,
        Err(response) => return response,
    };

    let observed = query.verify_token.as_deref().map(str::trim).unwrap_or("");
    let matched = accounts.iter().find(|account| {
        let expected = account.verify_token.as_deref().map(str::trim).unwrap_or("");
        !expected.is_empty() && observed == expected
    });
    match matched {
        Some(account) if query.mode.as_deref() == Some("subscribe") => {
            info!(account_id = %account.id, "webhook subscription verified");
            (StatusCode::OK, query.challenge.unwrap_or_default()).into_response()
        }
        _ => {
            warn!(platform = %platform, "webhook verification failed");
            error(StatusCode::FORBIDDEN, "webhook verification failed")
        }
    }
}

/// POST /webhooks/{platform}
///
/// Picks the receiving account from the ids in the body, checks the
/// signature when that account has a webhook secret, then queues the body.
/// Always answers `200 EVENT_RECEIVED` once the body is queued.
pub async fn receive_webhook(
    State(state): State<GatewayState>,
    Path(platform): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let accounts = match webhook_accounts(&state, &platform).await {
        Ok(accounts) => accounts,
        Err(response) => return response,
    };

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(platform = %platform, error = %e, "webhook body is not JSON");
            return error(StatusCode::BAD_REQUEST, "invalid webhook payload");
        }
    };
    let Some(account) = receiving_account(accounts, &payload) else {
        return error(StatusCode::NOT_FOUND, "no webhook account");
    };

    if let Some(secret) = account.webhook_secret.as_deref().filter(|s| !s.is_empty()) {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if let Err(e) = verify_signature(secret, &body, signature) {
            warn!(account_id = %account.id, error = %e, "webhook signature rejected");
            return error(StatusCode::UNAUTHORIZED, "invalid signature");
        }
    }

    let item = IngestItem::Webhook {
        platform: account.platform,
        kind: account.kind,
        payload,
    };
    match state.ingest_tx.try_send(item) {
        Ok(()) => {
            debug!(account_id = %account.id, bytes = body.len(), "webhook queued");
            (StatusCode::OK, EVENT_RECEIVED).into_response()
        }
        // The platform redelivers on a non-2xx answer.
        Err(TrySendError::Full(_)) => {
            warn!(account_id = %account.id, "ingest queue full, asking for redelivery");
            error(StatusCode::SERVICE_UNAVAILABLE, "ingest queue full")
        }
        Err(TrySendError::Closed(_)) => {
            error(StatusCode::SERVICE_UNAVAILABLE, "ingestion is shutting down")
        }
    }
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    let storage = match state.storage.health_check().await {
        Ok(HealthStatus::Healthy) => "healthy".to_string(),
        Ok(HealthStatus::Degraded(reason)) => format!("degraded: {reason}"),
        Ok(HealthStatus::Unhealthy(reason)) => format!("unhealthy: {reason}"),
        Err(e) => format!("unhealthy: {e}"),
    };
    let mut sessions: Vec<SessionHealth> = state
        .sessions
        .account_ids()
        .into_iter()
        .filter_map(|id| {
            state.sessions.status(&id).map(|s| SessionHealth {
                account_id: id,
                state: s.state,
            })
        })
        .collect();
    sessions.sort_by(|a, b| a.account_id.cmp(&b.account_id));

    let status = if storage == "healthy" { "ok" } else { "degraded" };
    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        storage,
        sessions,
    })
}
