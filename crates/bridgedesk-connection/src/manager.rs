// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The connection manager.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use bridgedesk_config::model::ConnectionConfig;
use bridgedesk_core::types::{
    Account, AccountKind, ConnectionState, IngestItem, SessionStatus, now_timestamp,
};
use bridgedesk_core::{
    BridgeError, Permission, PlatformSender, Principal, SessionConnector, StorageAdapter,
    authorize,
};

use crate::actor::{Command, SessionActor};
use crate::forwarder::Forwarder;
use crate::registry::{SessionHandle, SessionRegistry};
use crate::sender::SessionSender;

/// Outcome of [`ConnectionManager::start`].
///
/// A start that does not settle in time is a failure carrying the status
/// at the deadline, which may hold a pending pairing challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartResult {
    pub success: bool,
    pub status: SessionStatus,
    pub error: Option<String>,
}

impl StartResult {
    fn from_status(status: SessionStatus) -> Self {
        let success = status.state == ConnectionState::Connected;
        let error = if success {
            None
        } else {
            Some(
                status
                    .last_error
                    .clone()
                    .unwrap_or_else(|| format!("session ended in state {}", status.state)),
            )
        };
        Self {
            success,
            status,
            error,
        }
    }
}

/// Owns every account's connection.
pub struct ConnectionManager {
    storage: Arc<dyn StorageAdapter>,
    connector: Arc<dyn SessionConnector>,
    validators: HashMap<AccountKind, Arc<dyn PlatformSender>>,
    ingest: mpsc::Sender<IngestItem>,
    registry: SessionRegistry,
    token_status: DashMap<String, SessionStatus>,
    config: ConnectionConfig,
}

impl ConnectionManager {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        connector: Arc<dyn SessionConnector>,
        ingest: mpsc::Sender<IngestItem>,
        config: ConnectionConfig,
    ) -> Self {
        Self {
            storage,
            connector,
            validators: HashMap::new(),
            ingest,
            registry: SessionRegistry::new(),
            token_status: DashMap::new(),
            config,
        }
    }

    /// Registers the sender used to validate token-based accounts of its kind.
    pub fn with_validator(mut self, sender: Arc<dyn PlatformSender>) -> Self {
        self.validators.insert(sender.kind(), sender);
        self
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// A platform sender that routes sends through the live paired sessions.
    pub fn sender(&self) -> Arc<SessionSender> {
        Arc::new(SessionSender::new(self.registry.clone()))
    }

    /// Brings `account_id` up and waits until it settles.
    ///
    /// Settles on `connected`, `error`, or a terminal disconnect. A pairing
    /// challenge does not settle it; the call then fails at the start
    /// deadline with the challenge available in the returned status.
    pub async fn start(&self, account_id: &str) -> Result<StartResult, BridgeError> {
        let account = self
            .storage
            .get_account(account_id)
            .await?
            .ok_or_else(|| BridgeError::not_found("account", account_id))?;

        if account.kind.is_token_based() {
            return Ok(self.validate_token_account(&account).await);
        }

        let (mut status_rx, spawned) = self
            .registry
            .get_or_spawn(account_id, || self.spawn_actor(account.clone()));
        if spawned {
            info!(account_id, platform = %account.platform, "starting paired session");
        } else {
            debug!(account_id, "start joined running session");
        }

        let timeout = self.config.start_timeout();
        let settled = tokio::time::timeout(timeout, async {
            status_rx
                .wait_for(|status| {
                    matches!(
                        status.state,
                        ConnectionState::Connected
                            | ConnectionState::Error
                            | ConnectionState::Disconnected
                    )
                })
                .await
                .map(|status| status.clone())
        })
        .await;

        match settled {
            Ok(Ok(status)) => Ok(StartResult::from_status(status)),
            Ok(Err(_)) => Ok(StartResult::from_status(self.status(account_id))),
            Err(_) => {
                let status = status_rx.borrow().clone();
                warn!(account_id, state = %status.state, "start timed out");
                Ok(StartResult {
                    success: false,
                    error: Some(format!(
                        "session did not connect within {}s (state {})",
                        timeout.as_secs(),
                        status.state
                    )),
                    status,
                })
            }
        }
    }

    fn spawn_actor(&self, account: Account) -> SessionHandle {
        let (command_tx, command_rx) = mpsc::channel(self.config.command_buffer);
        let mut initial = SessionStatus::disconnected(&account.id);
        initial.state = ConnectionState::Connecting;
        let (status_tx, status_rx) = watch::channel(initial);

        let forwarder = Forwarder::spawn(
            &account.id,
            self.ingest.clone(),
            self.config.overflow_buffer,
        );
        let actor = SessionActor {
            account,
            connector: Arc::clone(&self.connector),
            storage: Arc::clone(&self.storage),
            forwarder,
            commands: command_rx,
            status: status_tx,
            reconnect_delay: self.config.reconnect_delay(),
        };
        let task = tokio::spawn(actor.run());
        SessionHandle {
            commands: command_tx,
            status: status_rx,
            task,
        }
    }

    async fn validate_token_account(&self, account: &Account) -> StartResult {
        let mut status = SessionStatus::disconnected(&account.id);
        let outcome = match (account.missing_credential(), self.validators.get(&account.kind)) {
            (Some(field), _) => Err(BridgeError::Configuration(format!(
                "account {} is missing {field}",
                account.id
            ))),
            (None, None) => Err(BridgeError::Configuration(format!(
                "no validator registered for {}",
                account.kind
            ))),
            (None, Some(validator)) => {
                let timeout = self.config.start_timeout();
                tokio::time::timeout(timeout, validator.validate(account))
                    .await
                    .unwrap_or(Err(BridgeError::Timeout { duration: timeout }))
            }
        };

        match outcome {
            Ok(identity) => {
                info!(account_id = %account.id, identity = %identity, "token account validated");
                status.state = ConnectionState::Connected;
                status.remote_identity = Some(identity);
            }
            Err(e) => {
                warn!(account_id = %account.id, error = %e, "token account validation failed");
                status.state = ConnectionState::Error;
                status.last_error = Some(e.to_string());
            }
        }
        status.updated_at = now_timestamp();

        if let Err(e) = self
            .storage
            .update_connection(
                &account.id,
                status.state,
                status.remote_identity.as_deref(),
                status.last_error.as_deref(),
            )
            .await
        {
            warn!(account_id = %account.id, error = %e, "failed to mirror connection state");
        }
        self.token_status
            .insert(account.id.clone(), status.clone());
        StartResult::from_status(status)
    }

    /// Current status of `account_id`. Never waits on the session.
    pub fn status(&self, account_id: &str) -> SessionStatus {
        if let Some(status) = self.registry.status(account_id) {
            return status;
        }
        if let Some(status) = self.token_status.get(account_id) {
            return status.clone();
        }
        SessionStatus::disconnected(account_id)
    }

    /// Closes `account_id`'s connection. Stopping a stopped account is a no-op.
    pub async fn stop(&self, account_id: &str) -> Result<(), BridgeError> {
        if self.token_status.remove(account_id).is_some() {
            self.storage
                .update_connection(account_id, ConnectionState::Disconnected, None, None)
                .await?;
            info!(account_id, "token account marked disconnected");
            return Ok(());
        }

        let Some(mut handle) = self.registry.remove(account_id) else {
            debug!(account_id, "stop: no session");
            return Ok(());
        };
        if handle.commands.send(Command::Stop).await.is_err() {
            debug!(account_id, "stop: actor already exited");
        }

        let timeout = self.config.stop_timeout();
        if tokio::time::timeout(timeout, &mut handle.task).await.is_err() {
            warn!(account_id, "session did not stop in time, aborting");
            handle.task.abort();
            self.storage
                .update_connection(account_id, ConnectionState::Disconnected, None, None)
                .await?;
        }
        info!(account_id, "session stopped");
        Ok(())
    }

    /// Stops every session and token account. Used at process shutdown.
    pub async fn stop_all(&self) {
        let mut ids = self.registry.account_ids();
        ids.extend(self.token_status.iter().map(|e| e.key().clone()));
        for id in ids {
            if let Err(e) = self.stop(&id).await {
                warn!(account_id = %id, error = %e, "failed to stop account");
            }
        }
    }

    /// Makes `account_id` the active account of its platform. Admin only.
    pub async fn activate(
        &self,
        principal: Option<&Principal>,
        account_id: &str,
    ) -> Result<(), BridgeError> {
        authorize(principal, Permission::ManageAccounts)?;
        let account = self
            .storage
            .get_account(account_id)
            .await?
            .ok_or_else(|| BridgeError::not_found("account", account_id))?;
        self.storage
            .set_active_account(account.platform, &account.id)
            .await?;
        info!(account_id, platform = %account.platform, "active account switched");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridgedesk_core::types::Platform;
    use bridgedesk_test_utils::{MockConnector, RecordingSender, TestStorage};

    fn fast_config() -> ConnectionConfig {
        ConnectionConfig {
            reconnect_delay_secs: 1,
            start_timeout_secs: 2,
            stop_timeout_secs: 1,
            command_buffer: 8,
            overflow_buffer: 64,
        }
    }

    #[tokio::test]
    async fn unknown_account_is_not_found() {
        let harness = TestStorage::new().await.unwrap();
        let (tx, _rx) = mpsc::channel(8);
        let manager =
            ConnectionManager::new(harness.adapter(), MockConnector::new(), tx, fast_config());
        let err = manager.start("missing").await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn token_account_start_validates_credentials() {
        let harness = TestStorage::new().await.unwrap();
        harness
            .active_account("wa-cloud", Platform::Whatsapp, AccountKind::CloudApi)
            .await
            .unwrap();
        let (tx, _rx) = mpsc::channel(8);
        let manager =
            ConnectionManager::new(harness.adapter(), MockConnector::new(), tx, fast_config())
                .with_validator(Arc::new(
                    RecordingSender::new(AccountKind::CloudApi).with_identity("Acme Support"),
                ));

        let result = manager.start("wa-cloud").await.unwrap();
        assert!(result.success);
        assert_eq!(
            manager.status("wa-cloud").remote_identity.as_deref(),
            Some("Acme Support")
        );
        let stored = harness.storage.get_account("wa-cloud").await.unwrap().unwrap();
        assert_eq!(stored.connection_state, ConnectionState::Connected);

        manager.stop("wa-cloud").await.unwrap();
        assert_eq!(
            manager.status("wa-cloud").state,
            ConnectionState::Disconnected
        );
    }

    #[tokio::test]
    async fn token_account_with_missing_credentials_fails() {
        let harness = TestStorage::new().await.unwrap();
        let account = Account::new("fb-page", Platform::Messenger, AccountKind::PageApi);
        harness.storage.upsert_account(&account).await.unwrap();
        let (tx, _rx) = mpsc::channel(8);
        let manager =
            ConnectionManager::new(harness.adapter(), MockConnector::new(), tx, fast_config())
                .with_validator(Arc::new(RecordingSender::new(AccountKind::PageApi)));

        let result = manager.start("fb-page").await.unwrap();
        assert!(!result.success);
        assert_eq!(result.status.state, ConnectionState::Error);
        assert!(result.error.unwrap().contains("access_token"));
    }

    #[tokio::test]
    async fn activate_requires_admin() {
        let harness = TestStorage::new().await.unwrap();
        let first = harness
            .active_account("wa-web", Platform::Whatsapp, AccountKind::PairedSession)
            .await
            .unwrap();
        let mut second = Account::new("wa-cloud", Platform::Whatsapp, AccountKind::CloudApi);
        second.access_token = Some("t".into());
        second.phone_number_id = Some("1".into());
        harness.storage.upsert_account(&second).await.unwrap();

        let (tx, _rx) = mpsc::channel(8);
        let manager =
            ConnectionManager::new(harness.adapter(), MockConnector::new(), tx, fast_config());

        let agent = Principal::new("u-2", bridgedesk_core::Role::Agent);
        let err = manager.activate(Some(&agent), "wa-cloud").await.unwrap_err();
        assert_eq!(err.kind(), "permission");
        assert_eq!(
            manager.activate(None, "wa-cloud").await.unwrap_err().kind(),
            "authentication"
        );

        let admin = Principal::new("u-1", bridgedesk_core::Role::Admin);
        manager.activate(Some(&admin), "wa-cloud").await.unwrap();
        let active = harness
            .storage
            .active_account(Platform::Whatsapp)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.id, "wa-cloud");
        assert_ne!(active.id, first.id);
    }

    #[tokio::test]
    async fn stop_without_session_is_noop() {
        let harness = TestStorage::new().await.unwrap();
        let (tx, _rx) = mpsc::channel(8);
        let manager =
            ConnectionManager::new(harness.adapter(), MockConnector::new(), tx, fast_config());
        manager.stop("wa-web").await.unwrap();
        manager.stop("wa-web").await.unwrap();
        assert_eq!(manager.status("wa-web").state, ConnectionState::Disconnected);
    }
}
