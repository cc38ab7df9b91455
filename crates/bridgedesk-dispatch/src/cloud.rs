// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp business cloud-API sender.

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
    #[serde(default)]
    messages: Vec<SentId>,
}

#[derive(Debug, Deserialize)]
struct SentId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PhoneNumberInfo {
    #[serde(default)]
    display_phone_number: Option<String>,
    #[serde(default)]
    verified_name: Option<String>,
}

/// Sends through `POST /{version}/{phone_number_id}/messages`.
pub struct CloudApiSender {
    graph: GraphClient,
}

impl CloudApiSender {
    pub fn new(graph: GraphClient) -> Self {
        Self { graph }
    }
}

fn credentials(account: &Account) -> Result<(&str, &str), BridgeError> {
    match (
        account.access_token.as_deref(),
        account.phone_number_id.as_deref(),
    ) {
        (Some(token), Some(phone_id)) => Ok((token, phone_id)),
        _ => Err(BridgeError::Configuration(format!(
            "account {} lacks cloud-API credentials",
            account.id
        ))),
    }
}

/// Builds the messages payload for one recipient.
fn message_body(recipient: &str, content: &OutboundContent) -> Result<Value, BridgeError> {
    let media = |kind: &str, caption: bool| -> Result<Value, BridgeError> {
        let link = content.media_url.as_deref().ok_or_else(|| {
            BridgeError::Validation(format!("{kind} message requires a media url"))
        })?;
        let mut object = json!({ "link": link });
        if caption && !content.text.is_empty() {
            object["caption"] = Value::String(content.text.clone());
        }
        let mut body = json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": recipient,
            "type": kind,
        });
        body[kind] = object;
        Ok(body)
    };

    match content.message_type {
        MessageType::Text => Ok(json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": recipient,
            "type": "text",
            "text": { "preview_url": false, "body": content.text },
        })),
        MessageType::Image => media("image", true),
        MessageType::Video => media("video", true),
        MessageType::Document => media("document", true),
        MessageType::Audio => media("audio", false),
        MessageType::Sticker => media("sticker", false),
        other => Err(BridgeError::Validation(format!(
            "cloud API cannot send {other} messages"
        ))),
    }
}

#[async_trait]
impl PluginAdapter for CloudApiSender {
    fn name(&self) -> &str {
        "cloud-api"
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
        debug!("cloud-API sender shutting down");
        Ok(())
    }
}

#[async_trait]
impl PlatformSender for CloudApiSender {
    fn kind(&self) -> AccountKind {
        AccountKind::CloudApi
    }

    async fn send(
        &self,
        account: &Account,
        recipient: &str,
        content: &OutboundContent,
    ) -> Result<String, BridgeError> {
        let (token, phone_id) = credentials(account)?;
        let body = message_body(recipient, content)?;
        let response: SendResponse = self
            .graph
            .post_json(token, &format!("{phone_id}/messages"), &body)
            .await?;
        response
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| BridgeError::transient("cloud API response carried no message id"))
    }

    async fn validate(&self, account: &Account) -> Result<String, BridgeError> {
        let (token, phone_id) = credentials(account)?;
        let info: PhoneNumberInfo = self
            .graph
            .get_json(
                token,
                &format!("{phone_id}?fields=display_phone_number,verified_name"),
            )
            .await?;
        info.verified_name
            .or(info.display_phone_number)
            .ok_or_else(|| BridgeError::Configuration(format!("phone number {phone_id} has no identity")))
    }
}
