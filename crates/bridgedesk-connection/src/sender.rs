// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Paired-session platform sender.

use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::debug;

use bridgedesk_core::types::{
    Account, AccountKind, AdapterType, ConnectionState, HealthStatus, OutboundContent,
};
use bridgedesk_core::{BridgeError, PlatformSender, PluginAdapter};

use crate::actor::Command;
use crate::registry::SessionRegistry;

/// Sends through the actor that owns the account's live session.
pub struct SessionSender {
    registry: SessionRegistry,
}

impl SessionSender {
    pub fn new(registry: SessionRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl PluginAdapter for SessionSender {
    fn name(&self) -> &str {
        "paired-session"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Session
    }

    async fn health_check(&self) -> Result<HealthStatus, BridgeError> {
        let down: Vec<String> = self
            .registry
            .account_ids()
            .into_iter()
            .filter(|id| {
                self.registry
                    .status(id)
                    .is_some_and(|s| s.state != ConnectionState::Connected)
            })
            .collect();
        if down.is_empty() {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Degraded(format!(
                "sessions not connected: {}",
                down.join(", ")
            )))
        }
    }

    async fn shutdown(&self) -> Result<(), BridgeError> {
        Ok(())
    }
}

#[async_trait]
impl PlatformSender for SessionSender {
    fn kind(&self) -> AccountKind {
        AccountKind::PairedSession
    }

    async fn send(
        &self,
        account: &Account,
        recipient: &str,
        content: &OutboundContent,
    ) -> Result<String, BridgeError> {
        let commands = self.registry.commands(&account.id).ok_or_else(|| {
            BridgeError::Configuration(format!("paired session {} is not running", account.id))
        })?;
        let (reply, response) = oneshot::channel();
        commands
            .send(Command::Send {
                recipient: recipient.to_string(),
                content: content.clone(),
                reply,
            })
            .await
            .map_err(|_| BridgeError::transient("paired session stopped"))?;
        debug!(account_id = %account.id, "send queued on paired session");
        response
            .await
            .map_err(|_| BridgeError::transient("paired session dropped the send"))?
    }

    /// The session's identity, if it is connected.
    async fn validate(&self, account: &Account) -> Result<String, BridgeError> {
        match self.registry.status(&account.id) {
            Some(status) if status.state == ConnectionState::Connected => Ok(status
                .remote_identity
                .unwrap_or_else(|| account.label.clone())),
            _ => Err(BridgeError::Configuration(format!(
                "paired session {} is not connected",
                account.id
            ))),
        }
    }
}
