// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends (SQLite, etc.).

use async_trait::async_trait;

use crate::error::BridgeError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    Account, AccountKind, AutomationExecution, AutomationRule, ConnectionState, Contact,
    Conversation, ConversationState, DeliveryState, InboundOutcome, Message, NewExecution,
    NewInbound, NewOutbound, NewRule, Platform, WebhookLogEntry,
};

/// Adapter for storage and persistence backends.
///
/// Multi-step writes (`record_inbound`, `record_outbound`, the active switch)
/// are atomic: either every row changes or none does.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), BridgeError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), BridgeError>;

    // --- Accounts ---

    /// Inserts or replaces an account's configuration. Connection state,
    /// identity and credentials of an existing row are preserved.
    async fn upsert_account(&self, account: &Account) -> Result<(), BridgeError>;

    async fn get_account(&self, id: &str) -> Result<Option<Account>, BridgeError>;

    async fn list_accounts(&self) -> Result<Vec<Account>, BridgeError>;

    /// Mirrors connection state into the account row.
    async fn update_connection(
        &self,
        id: &str,
        state: ConnectionState,
        remote_identity: Option<&str>,
        last_error: Option<&str>,
    ) -> Result<(), BridgeError>;

    async fn set_pairing_code(&self, id: &str, code: Option<&str>) -> Result<(), BridgeError>;

    async fn save_credentials(&self, id: &str, blob: &str) -> Result<(), BridgeError>;

    async fn load_credentials(&self, id: &str) -> Result<Option<String>, BridgeError>;

    /// Removes credentials, pairing code and remote identity.
    async fn purge_credentials(&self, id: &str) -> Result<(), BridgeError>;

    // --- Active configuration ---

    /// Makes `account_id` the active account for `platform` in one upsert.
    async fn set_active_account(
        &self,
        platform: Platform,
        account_id: &str,
    ) -> Result<(), BridgeError>;

    async fn active_account(&self, platform: Platform) -> Result<Option<Account>, BridgeError>;

    /// Clears the slot for `platform` only if `account_id` holds it.
    /// Returns whether a slot was cleared.
    async fn clear_active_if(
        &self,
        platform: Platform,
        account_id: &str,
    ) -> Result<bool, BridgeError>;

    // --- Contacts ---

    async fn get_contact(&self, id: &str) -> Result<Option<Contact>, BridgeError>;

    async fn find_contact(
        &self,
        platform: Platform,
        external_id: &str,
    ) -> Result<Option<Contact>, BridgeError>;

    /// Attaches `tag` to the contact, creating the tag if needed. Idempotent.
    async fn tag_contact(&self, contact_id: &str, tag: &str) -> Result<(), BridgeError>;

    async fn contact_tags(&self, contact_id: &str) -> Result<Vec<String>, BridgeError>;

    // --- Conversations ---

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, BridgeError>;

    async fn assign_agent(&self, conversation_id: &str, agent: &str) -> Result<(), BridgeError>;

    async fn set_conversation_state(
        &self,
        conversation_id: &str,
        state: ConversationState,
    ) -> Result<(), BridgeError>;

    // --- Messages ---

    /// Resolves contact and conversation, inserts the inbound message and
    /// bumps counters, all in one transaction.
    async fn record_inbound(&self, inbound: NewInbound) -> Result<InboundOutcome, BridgeError>;

    /// Inserts an outbound message, bumps counters and marks the contact active.
    async fn record_outbound(&self, outbound: NewOutbound) -> Result<Message, BridgeError>;

    /// Resolves or creates the contact and open conversation for a send to a
    /// raw address.
    async fn resolve_for_outbound(
        &self,
        platform: Platform,
        channel_kind: AccountKind,
        external_id: &str,
    ) -> Result<(Contact, Conversation), BridgeError>;

    /// Moves the delivery state of the message with `external_id` forward.
    /// Returns whether a row changed.
    async fn update_delivery_state(
        &self,
        external_id: &str,
        state: DeliveryState,
    ) -> Result<bool, BridgeError>;

    /// Timestamp of the most recent outbound message in the conversation.
    async fn last_outbound_at(&self, conversation_id: &str)
    -> Result<Option<String>, BridgeError>;

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, BridgeError>;

    // --- Rules ---

    async fn create_rule(&self, rule: NewRule) -> Result<AutomationRule, BridgeError>;

    async fn get_rule(&self, id: i64) -> Result<Option<AutomationRule>, BridgeError>;

    async fn list_rules(&self) -> Result<Vec<AutomationRule>, BridgeError>;

    /// Active rules applying to `platform`, ordered by priority then id.
    async fn list_active_rules(
        &self,
        platform: Platform,
    ) -> Result<Vec<AutomationRule>, BridgeError>;

    async fn set_rule_active(&self, id: i64, active: bool) -> Result<(), BridgeError>;

    // --- Executions ---

    async fn record_execution(
        &self,
        execution: NewExecution,
    ) -> Result<AutomationExecution, BridgeError>;

    async fn list_executions(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<AutomationExecution>, BridgeError>;

    // --- Webhook log ---

    /// Appends a raw payload and returns its entry id.
    async fn append_webhook(
        &self,
        platform: Platform,
        source: &str,
        payload: &str,
    ) -> Result<i64, BridgeError>;

    /// Stamps `processed_at` and clears any earlier error.
    async fn mark_webhook_processed(&self, id: i64) -> Result<(), BridgeError>;

    async fn mark_webhook_failed(&self, id: i64, error: &str) -> Result<(), BridgeError>;

    async fn get_webhook(&self, id: i64) -> Result<Option<WebhookLogEntry>, BridgeError>;

    /// Oldest entries that carry an error, up to `limit`.
    async fn failed_webhooks(&self, limit: usize) -> Result<Vec<WebhookLogEntry>, BridgeError>;
}
