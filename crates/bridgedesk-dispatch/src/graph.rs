// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Graph API shared by the cloud-API and page-API senders.
//!
//! Provides [`GraphClient`] which handles URL construction, bearer
//! authentication, and mapping of HTTP failures onto [`BridgeError`].

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use bridgedesk_config::model::DispatchConfig;
use bridgedesk_core::BridgeError;

/// Error envelope returned by the Graph API.
#[derive(Debug, Deserialize)]
struct GraphErrorResponse {
    error: GraphErrorBody,
}

#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    message: String,
    #[serde(default)]
    code: Option<i64>,
}

/// Versioned Graph API client.
///
/// Tokens are per account, so they are passed per request rather than
/// baked into default headers.
#[derive(Debug, Clone)]
pub struct GraphClient {
    client: reqwest::Client,
    base_url: String,
    api_version: String,
    timeout: Duration,
}

impl GraphClient {
    pub fn new(config: &DispatchConfig) -> Result<Self, BridgeError> {
        let timeout = config.send_timeout();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BridgeError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.graph_base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            timeout,
        })
    }

    /// Full URL for a versioned path such as `12345/messages`.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            self.api_version,
            path.trim_start_matches('/')
        )
    }

    /// POSTs `body` as JSON and decodes the JSON response.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, BridgeError> {
        let url = self.endpoint(path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        self.decode(response).await
    }

    /// GETs `path` (which may carry a query string) and decodes the JSON response.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
    ) -> Result<T, BridgeError> {
        let url = self.endpoint(path);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        self.decode(response).await
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, BridgeError> {
        let status = response.status();
        let body = response.text().await.map_err(|e| self.request_error(e))?;
        debug!(status = %status, "graph response received");

        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        serde_json::from_str(&body).map_err(|e| BridgeError::TransientIo {
            message: format!("failed to parse graph response: {e}"),
            source: Some(Box::new(e)),
        })
    }

    fn request_error(&self, err: reqwest::Error) -> BridgeError {
        if err.is_timeout() {
            BridgeError::Timeout {
                duration: self.timeout,
            }
        } else {
            BridgeError::TransientIo {
                message: format!("HTTP request failed: {err}"),
                source: Some(Box::new(err)),
            }
        }
    }
}

/// Maps a non-success HTTP status onto the error taxonomy.
///
/// 429 and 5xx are transient, 401/403 mean the account's credentials are
/// wrong, and any other 4xx means the request itself was rejected.
pub fn status_error(status: reqwest::StatusCode, body: &str) -> BridgeError {
    let detail = match serde_json::from_str::<GraphErrorResponse>(body) {
        Ok(parsed) => match parsed.error.code {
            Some(code) => format!("{} (code {code})", parsed.error.message),
            None => parsed.error.message,
        },
        Err(_) => body.to_string(),
    };
    let message = format!("platform returned {status}: {detail}");
    match status.as_u16() {
        429 | 500..=599 => BridgeError::transient(message),
        401 | 403 => BridgeError::Configuration(message),
        _ => BridgeError::Validation(message),
    }
}
