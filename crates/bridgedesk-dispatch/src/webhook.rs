// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound HTTP calls made by the `call_webhook` automation action.

use std::time::Duration;

use tracing::debug;

use bridgedesk_core::BridgeError;

use crate::graph::status_error;

/// Hard deadline for one webhook call.
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// POSTs JSON payloads to operator-configured URLs.
///
/// The whole exchange (connect, send, response headers) is bounded by one
/// deadline; on expiry the request future is dropped and a
/// [`BridgeError::Timeout`] is returned.
#[derive(Debug, Clone)]
pub struct WebhookCaller {
    client: reqwest::Client,
    timeout: Duration,
}

impl WebhookCaller {
    pub fn new() -> Result<Self, BridgeError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| BridgeError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            timeout: WEBHOOK_TIMEOUT,
        })
    }

    /// Overrides the deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Calls `url` with `payload` and returns the response status code.
    pub async fn call(&self, url: &str, payload: &serde_json::Value) -> Result<u16, BridgeError> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(BridgeError::Validation(format!(
                "webhook url must be http(s): {url}"
            )));
        }

        let request = self.client.post(url).json(payload).send();
        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| BridgeError::Timeout {
                duration: self.timeout,
            })?
            .map_err(|e| BridgeError::TransientIo {
                message: format!("webhook request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(url, status = %status, "webhook responded");
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            Err(status_error(status, ""))
        }
    }
}
