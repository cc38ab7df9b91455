// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use bridgedesk_config::model::StorageConfig;
use bridgedesk_core::types::{
    Account, AccountKind, AutomationExecution, AutomationRule, ConnectionState, Contact,
    Conversation, ConversationState, DeliveryState, InboundOutcome, Message, NewExecution,
    NewInbound, NewOutbound, NewRule, Platform, WebhookLogEntry,
};
use bridgedesk_core::{AdapterType, BridgeError, HealthStatus, PluginAdapter, StorageAdapter};

use crate::database::{Database, OpenOptions, checkpoint, map_tr_err};
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is opened on the first call to
/// [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// The connection is not opened until `initialize` is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Opens storage at `path` with default settings and initializes it.
    pub async fn open(path: &str) -> Result<Self, BridgeError> {
        let storage = Self::new(StorageConfig {
            database_path: path.to_string(),
            ..StorageConfig::default()
        });
        storage.initialize().await?;
        Ok(storage)
    }

    /// The underlying database, or an error if not initialized.
    pub fn database(&self) -> Result<&Database, BridgeError> {
        self.db.get().ok_or_else(|| BridgeError::Persistence {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, BridgeError> {
        let Ok(db) = self.database() else {
            return Ok(HealthStatus::Unhealthy("not initialized".into()));
        };
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), BridgeError> {
        if let Some(db) = self.db.get() {
            checkpoint(db.connection()).await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), BridgeError> {
        let options = OpenOptions {
            wal_mode: self.config.wal_mode,
            busy_timeout: Duration::from_millis(self.config.busy_timeout_ms),
        };
        let db = Database::open_with(&self.config.database_path, options).await?;
        self.db.set(db).map_err(|_| BridgeError::Persistence {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), BridgeError> {
        let db = self.database()?;
        checkpoint(db.connection()).await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    // --- Accounts ---

    async fn upsert_account(&self, account: &Account) -> Result<(), BridgeError> {
        queries::accounts::upsert_account(self.database()?, account).await
    }

    async fn get_account(&self, id: &str) -> Result<Option<Account>, BridgeError> {
        queries::accounts::get_account(self.database()?, id).await
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, BridgeError> {
        queries::accounts::list_accounts(self.database()?).await
    }

    async fn update_connection(
        &self,
        id: &str,
        state: ConnectionState,
        remote_identity: Option<&str>,
        last_error: Option<&str>,
    ) -> Result<(), BridgeError> {
        queries::accounts::update_connection(self.database()?, id, state, remote_identity, last_error)
            .await
    }

    async fn set_pairing_code(&self, id: &str, code: Option<&str>) -> Result<(), BridgeError> {
        queries::accounts::set_pairing_code(self.database()?, id, code).await
    }

    async fn save_credentials(&self, id: &str, blob: &str) -> Result<(), BridgeError> {
        queries::accounts::save_credentials(self.database()?, id, blob).await
    }

    async fn load_credentials(&self, id: &str) -> Result<Option<String>, BridgeError> {
        queries::accounts::load_credentials(self.database()?, id).await
    }

    async fn purge_credentials(&self, id: &str) -> Result<(), BridgeError> {
        queries::accounts::purge_credentials(self.database()?, id).await
    }

    async fn set_active_account(
        &self,
        platform: Platform,
        account_id: &str,
    ) -> Result<(), BridgeError> {
        queries::accounts::set_active_account(self.database()?, platform, account_id).await
    }

    async fn active_account(&self, platform: Platform) -> Result<Option<Account>, BridgeError> {
        queries::accounts::active_account(self.database()?, platform).await
    }

    async fn clear_active_if(
        &self,
        platform: Platform,
        account_id: &str,
    ) -> Result<bool, BridgeError> {
        queries::accounts::clear_active_if(self.database()?, platform, account_id).await
    }

    // --- Contacts ---

    async fn get_contact(&self, id: &str) -> Result<Option<Contact>, BridgeError> {
        queries::contacts::get_contact(self.database()?, id).await
    }

    async fn find_contact(
        &self,
        platform: Platform,
        external_id: &str,
    ) -> Result<Option<Contact>, BridgeError> {
        queries::contacts::find_contact(self.database()?, platform, external_id).await
    }

    async fn tag_contact(&self, contact_id: &str, tag: &str) -> Result<(), BridgeError> {
        queries::contacts::tag_contact(self.database()?, contact_id, tag).await
    }

    async fn contact_tags(&self, contact_id: &str) -> Result<Vec<String>, BridgeError> {
        queries::contacts::contact_tags(self.database()?, contact_id).await
    }

    // --- Conversations ---

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, BridgeError> {
        queries::conversations::get_conversation(self.database()?, id).await
    }

    async fn assign_agent(&self, conversation_id: &str, agent: &str) -> Result<(), BridgeError> {
        queries::conversations::assign_agent(self.database()?, conversation_id, agent).await
    }

    async fn set_conversation_state(
        &self,
        conversation_id: &str,
        state: ConversationState,
    ) -> Result<(), BridgeError> {
        queries::conversations::set_conversation_state(self.database()?, conversation_id, state)
            .await
    }

    // --- Messages ---

    async fn record_inbound(&self, inbound: NewInbound) -> Result<InboundOutcome, BridgeError> {
        queries::messages::record_inbound(self.database()?, inbound).await
    }

    async fn record_outbound(&self, outbound: NewOutbound) -> Result<Message, BridgeError> {
        queries::messages::record_outbound(self.database()?, outbound).await
    }

    async fn resolve_for_outbound(
        &self,
        platform: Platform,
        channel_kind: AccountKind,
        external_id: &str,
    ) -> Result<(Contact, Conversation), BridgeError> {
        queries::messages::resolve_for_outbound(self.database()?, platform, channel_kind, external_id)
            .await
    }

    async fn update_delivery_state(
        &self,
        external_id: &str,
        state: DeliveryState,
    ) -> Result<bool, BridgeError> {
        queries::messages::update_delivery_state(self.database()?, external_id, state).await
    }

    async fn last_outbound_at(
        &self,
        conversation_id: &str,
    ) -> Result<Option<String>, BridgeError> {
        queries::messages::last_outbound_at(self.database()?, conversation_id).await
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, BridgeError> {
        queries::messages::list_messages(self.database()?, conversation_id).await
    }

    // --- Rules ---

    async fn create_rule(&self, rule: NewRule) -> Result<AutomationRule, BridgeError> {
        queries::rules::create_rule(self.database()?, rule).await
    }

    async fn get_rule(&self, id: i64) -> Result<Option<AutomationRule>, BridgeError> {
        queries::rules::get_rule(self.database()?, id).await
    }

    async fn list_rules(&self) -> Result<Vec<AutomationRule>, BridgeError> {
        queries::rules::list_rules(self.database()?).await
    }

    async fn list_active_rules(
        &self,
        platform: Platform,
    ) -> Result<Vec<AutomationRule>, BridgeError> {
        queries::rules::list_active_rules(self.database()?, platform).await
    }

    async fn set_rule_active(&self, id: i64, active: bool) -> Result<(), BridgeError> {
        queries::rules::set_rule_active(self.database()?, id, active).await
    }

    // --- Executions ---

    async fn record_execution(
        &self,
        execution: NewExecution,
    ) -> Result<AutomationExecution, BridgeError> {
        queries::executions::record_execution(self.database()?, execution).await
    }

    async fn list_executions(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<AutomationExecution>, BridgeError> {
        queries::executions::list_executions(self.database()?, conversation_id).await
    }

    // --- Webhook log ---

    async fn append_webhook(
        &self,
        platform: Platform,
        source: &str,
        payload: &str,
    ) -> Result<i64, BridgeError> {
        queries::webhook_log::append_webhook(self.database()?, platform, source, payload).await
    }

    async fn mark_webhook_processed(&self, id: i64) -> Result<(), BridgeError> {
        queries::webhook_log::mark_processed(self.database()?, id).await
    }

    async fn mark_webhook_failed(&self, id: i64, error: &str) -> Result<(), BridgeError> {
        queries::webhook_log::mark_failed(self.database()?, id, error).await
    }

    async fn get_webhook(&self, id: i64) -> Result<Option<WebhookLogEntry>, BridgeError> {
        queries::webhook_log::get_webhook(self.database()?, id).await
    }

    async fn failed_webhooks(&self, limit: usize) -> Result<Vec<WebhookLogEntry>, BridgeError> {
        queries::webhook_log::failed_webhooks(self.database()?, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn uninitialized_storage_reports_errors() {
        let storage = SqliteStorage::new(StorageConfig::default());
        assert!(matches!(
            storage.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
        let err = storage.list_accounts().await.unwrap_err();
        assert_eq!(err.kind(), "persistence");
    }

    #[tokio::test]
    async fn initialize_twice_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bridgedesk.db");
        let storage = SqliteStorage::open(path.to_str().unwrap()).await.unwrap();
        assert!(storage.initialize().await.is_err());
        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);
        storage.close().await.unwrap();
    }

    #[tokio::test]
    async fn adapter_identity() {
        let storage = SqliteStorage::new(StorageConfig::default());
        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
    }
}
