// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messenger / Instagram page messaging sender.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use bridgedesk_core::types::{
    Account, AccountKind, AdapterType, HealthStatus, MessageType, OutboundContent,
};
use bridgedesk_core::{BridgeError, PlatformSender, PluginAdapter};

use crate::graph::GraphClient;

#[derive(Debug, Deserialize)]
struct SendResponse {
    message_id: String,
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

/// Sends through `POST /{version}/me/messages` with the page token.
pub struct PageApiSender {
    graph: GraphClient,
}

impl PageApiSender {
    pub fn new(graph: GraphClient) -> Self {
        Self { graph }
    }
}

fn token(account: &Account) -> Result<&str, BridgeError> {
    account.access_token.as_deref().ok_or_else(|| {
        BridgeError::Configuration(format!("account {} has no page token", account.id))
    })
}

fn message_body(recipient: &str, content: &OutboundContent) -> Result<Value, BridgeError> {
    let attachment_type = match content.message_type {
        MessageType::Text => None,
        MessageType::Image | MessageType::Sticker => Some("image"),
        MessageType::Audio => Some("audio"),
        MessageType::Video => Some("video"),
        MessageType::Document => Some("file"),
        other => {
            return Err(BridgeError::Validation(format!(
                "page API cannot send {other} messages"
            )));
        }
    };

    let message = match attachment_type {
        None => json!({ "text": content.text }),
        Some(kind) => {
            let url = content.media_url.as_deref().ok_or_else(|| {
                BridgeError::Validation(format!("{kind} attachment requires a media url"))
            })?;
            json!({
                "attachment": {
                    "type": kind,
                    "payload": { "url": url, "is_reusable": true }
                }
            })
        }
    };

    Ok(json!({
        "recipient": { "id": recipient },
        "messaging_type": "RESPONSE",
        "message": message,
    }))
}

#[async_trait]
impl PluginAdapter for PageApiSender {
    fn name(&self) -> &str {
        "page-api"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Sender
    }

    async fn health_check(&self) -> Result<HealthStatus, BridgeError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), BridgeError> {
        debug!("page-API sender shutting down");
        Ok(())
    }
}

#[async_trait]
impl PlatformSender for PageApiSender {
    fn kind(&self) -> AccountKind {
        AccountKind::PageApi
    }

    async fn send(
        &self,
        account: &Account,
        recipient: &str,
        content: &OutboundContent,
    ) -> Result<String, BridgeError> {
        let token = token(account)?;
        let body = message_body(recipient, content)?;
        let response: SendResponse = self.graph.post_json(token, "me/messages", &body).await?;
        Ok(response.message_id)
    }

    /// Resolves the token's page and checks it is the configured one.
    async fn validate(&self, account: &Account) -> Result<String, BridgeError> {
        let token = token(account)?;
        let page: PageInfo = self.graph.get_json(token, "me?fields=id,name").await?;
        match account.page_id.as_deref() {
            Some(expected) if expected != page.id => {
                return Err(BridgeError::Configuration(format!(
                    "token belongs to page {} but account {} is configured for page {expected}",
                    page.id, account.id
                )));
            }
            _ => {}
        }
        Ok(page.name.unwrap_or(page.id))
    }
}
