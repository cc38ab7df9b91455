// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The outbound dispatcher.
//!
//! One send runs: resolve the target, pick the active account for the
//! platform, check its credentials, pick the sender for the account kind,
//! call it under the send deadline, and record the outbound message. A
//! send to a raw address creates its contact and conversation only after
//! the platform accepted it.
//! Every failure along the way becomes a [`SendResult`] with
//! `success == false`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use bridgedesk_config::model::DispatchConfig;
use bridgedesk_core::types::{
    AccountKind, DeliveryState, NewOutbound, OutboundContent, Platform, SendRequest, SendResult,
    SendTarget,
};
use bridgedesk_core::{
    BridgeError, OutboundSender, Permission, PlatformSender, Principal, StorageAdapter, authorize,
};

use crate::address::normalize_address;
use crate::cloud::CloudApiSender;
use crate::graph::GraphClient;
use crate::page::PageApiSender;

/// A send target after the storage lookups that can happen before an
/// account is chosen.
enum Resolved {
    /// An existing conversation and its contact's platform address.
    Known {
        conversation_id: String,
        recipient: String,
    },
    /// A raw address, not yet normalized.
    Address(String),
}

/// Routes logical sends to the active account of each platform.
pub struct Dispatcher {
    storage: Arc<dyn StorageAdapter>,
    senders: HashMap<AccountKind, Arc<dyn PlatformSender>>,
    send_timeout: Duration,
}

impl Dispatcher {
    /// A dispatcher with no senders registered.
    pub fn new(storage: Arc<dyn StorageAdapter>, send_timeout: Duration) -> Self {
        Self {
            storage,
            senders: HashMap::new(),
            send_timeout,
        }
    }

    /// A dispatcher with the cloud-API and page-API senders registered.
    ///
    /// The paired-session sender is owned by the connection manager and
    /// added with [`Dispatcher::with_sender`].
    pub fn from_config(
        storage: Arc<dyn StorageAdapter>,
        config: &DispatchConfig,
    ) -> Result<Self, BridgeError> {
        let graph = GraphClient::new(config)?;
        Ok(Self::new(storage, config.send_timeout())
            .with_sender(Arc::new(CloudApiSender::new(graph.clone())))
            .with_sender(Arc::new(PageApiSender::new(graph))))
    }

    /// Registers `sender` for its account kind, replacing any earlier one.
    pub fn with_sender(mut self, sender: Arc<dyn PlatformSender>) -> Self {
        self.senders.insert(sender.kind(), sender);
        self
    }

    /// The sender registered for `kind`, if any.
    pub fn sender(&self, kind: AccountKind) -> Option<Arc<dyn PlatformSender>> {
        self.senders.get(&kind).cloned()
    }

    /// Sends on behalf of a user. Anonymous callers are rejected.
    pub async fn send_manual(
        &self,
        principal: Option<&Principal>,
        request: SendRequest,
    ) -> SendResult {
        let platform = match &request.target {
            SendTarget::Address { platform, .. } => Some(*platform),
            SendTarget::Conversation { .. } => None,
        };
        if let Err(e) = authorize(principal, Permission::SendMessage) {
            warn!(error = %e, "manual send rejected");
            return SendResult::failure(platform, &e);
        }
        if let Some(principal) = principal {
            debug!(user_id = %principal.user_id, "manual send");
        }
        self.send(request).await
    }

    /// Sends `request` and reports the outcome. Never fails.
    pub async fn send(&self, request: SendRequest) -> SendResult {
        let mut platform = None;
        match self.dispatch(request, &mut platform).await {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    platform = ?platform,
                    error = %e,
                    error_kind = e.kind(),
                    retryable = e.is_retryable(),
                    "outbound send failed"
                );
                SendResult::failure(platform, &e)
            }
        }
    }

    async fn dispatch(
        &self,
        request: SendRequest,
        platform_out: &mut Option<Platform>,
    ) -> Result<SendResult, BridgeError> {
        let SendRequest { target, content } = request;
        if content.text.trim().is_empty() && content.media_url.is_none() {
            return Err(BridgeError::Validation("message has no content".into()));
        }

        let (platform, resolved) = match target {
            SendTarget::Conversation { conversation_id } => {
                let conversation = self
                    .storage
                    .get_conversation(&conversation_id)
                    .await?
                    .ok_or_else(|| BridgeError::not_found("conversation", &conversation_id))?;
                let contact = self
                    .storage
                    .get_contact(&conversation.contact_id)
                    .await?
                    .ok_or_else(|| BridgeError::not_found("contact", &conversation.contact_id))?;
                (
                    conversation.platform,
                    Resolved::Known {
                        conversation_id: conversation.id,
                        recipient: contact.external_id,
                    },
                )
            }
            SendTarget::Address { platform, address } => (platform, Resolved::Address(address)),
        };
        *platform_out = Some(platform);

        let account = self
            .storage
            .active_account(platform)
            .await?
            .ok_or_else(|| {
                BridgeError::Configuration(format!("no active account for {platform}"))
            })?;
        if let Some(field) = account.missing_credential() {
            return Err(BridgeError::Configuration(format!(
                "active {platform} account {} is missing {field}",
                account.id
            )));
        }
        let sender = self.senders.get(&account.kind).ok_or_else(|| {
            BridgeError::Configuration(format!("no sender available for {}", account.kind))
        })?;

        let (recipient, conversation_id) = match resolved {
            Resolved::Known {
                conversation_id,
                recipient,
            } => (recipient, Some(conversation_id)),
            Resolved::Address(raw) => (normalize_address(platform, &raw)?, None),
        };

        let message_id = tokio::time::timeout(
            self.send_timeout,
            sender.send(&account, &recipient, &content),
        )
        .await
        .map_err(|_| BridgeError::Timeout {
            duration: self.send_timeout,
        })??;

        info!(
            platform = %platform,
            account_id = %account.id,
            recipient = %recipient,
            message_id = %message_id,
            "outbound message sent"
        );

        let record_id = match self
            .record_sent(platform, account.kind, &recipient, conversation_id, &content, &message_id)
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                // The platform accepted the message; only the local copy is missing.
                warn!(
                    recipient = %recipient,
                    message_id = %message_id,
                    error = %e,
                    "failed to record outbound message"
                );
                None
            }
        };

        Ok(SendResult {
            success: true,
            message_id: Some(message_id),
            record_id,
            provider: Some(account.kind),
            platform: Some(platform),
            error: None,
            error_kind: None,
        })
    }

    /// Stores a message the platform accepted. A raw-address send resolves
    /// its contact and open conversation here.
    async fn record_sent(
        &self,
        platform: Platform,
        kind: AccountKind,
        recipient: &str,
        conversation_id: Option<String>,
        content: &OutboundContent,
        message_id: &str,
    ) -> Result<String, BridgeError> {
        let conversation_id = match conversation_id {
            Some(id) => id,
            None => {
                let (_, conversation) = self
                    .storage
                    .resolve_for_outbound(platform, kind, recipient)
                    .await?;
                conversation.id
            }
        };
        let message = self
            .storage
            .record_outbound(NewOutbound {
                conversation_id,
                message_type: content.message_type,
                content: content.text.clone(),
                media_url: content.media_url.clone(),
                external_id: Some(message_id.to_string()),
                delivery_state: DeliveryState::Sent,
            })
            .await?;
        Ok(message.id)
    }
}

#[async_trait]
impl OutboundSender for Dispatcher {
    async fn send(&self, request: SendRequest) -> SendResult {
        Dispatcher::send(self, request).await
    }
}
