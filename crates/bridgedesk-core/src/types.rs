// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Bridgedesk workspace.
//!
//! Enumerations render and parse as snake_case strings; that form is what
//! storage persists and what the configuration surface accepts.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Timestamp format used for every persisted timestamp (UTC, millisecond precision).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Current UTC time formatted with [`TIMESTAMP_FORMAT`].
pub fn now_timestamp() -> String {
    chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a persisted timestamp. Accepts any RFC 3339 value as well.
pub fn parse_timestamp(value: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&chrono::Utc))
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a [`PluginAdapter`](crate::PluginAdapter).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Sender,
    Session,
}

// --- Accounts and connections ---

/// External messaging platform.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Whatsapp,
    Messenger,
    Instagram,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Whatsapp, Platform::Messenger, Platform::Instagram];
}

/// How an account talks to its platform.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    /// Socket-paired personal account with a long-lived session.
    PairedSession,
    /// Business cloud API, token based.
    CloudApi,
    /// Page messaging API (Messenger / Instagram), token based.
    PageApi,
}

impl AccountKind {
    /// Token-based accounts have no persistent connection.
    pub fn is_token_based(self) -> bool {
        !matches!(self, AccountKind::PairedSession)
    }

    /// Whether this kind of account can serve the given platform.
    pub fn supports(self, platform: Platform) -> bool {
        match self {
            AccountKind::PairedSession | AccountKind::CloudApi => platform == Platform::Whatsapp,
            AccountKind::PageApi => matches!(platform, Platform::Messenger | Platform::Instagram),
        }
    }
}

/// Connection lifecycle state of an account.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    QrPending,
    Connected,
    Error,
}

/// A configured connection to one external messaging platform.
#[derive(Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub platform: Platform,
    pub kind: AccountKind,
    pub label: String,
    pub access_token: Option<String>,
    pub phone_number_id: Option<String>,
    pub page_id: Option<String>,
    pub webhook_secret: Option<String>,
    pub verify_token: Option<String>,
    pub connection_state: ConnectionState,
    pub remote_identity: Option<String>,
    pub last_error: Option<String>,
    pub pairing_code: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Account {
    /// Creates a disconnected account with no credentials.
    pub fn new(id: impl Into<String>, platform: Platform, kind: AccountKind) -> Self {
        let now = now_timestamp();
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            platform,
            kind,
            access_token: None,
            phone_number_id: None,
            page_id: None,
            webhook_secret: None,
            verify_token: None,
            connection_state: ConnectionState::Disconnected,
            remote_identity: None,
            last_error: None,
            pairing_code: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Names the first credential field this account needs for sending, if any is missing.
    ///
    /// Paired-session accounts carry their credentials in the session blob,
    /// so they never report a missing field here.
    pub fn missing_credential(&self) -> Option<&'static str> {
        let blank = |v: &Option<String>| v.as_deref().is_none_or(|s| s.trim().is_empty());
        match self.kind {
            AccountKind::PairedSession => None,
            AccountKind::CloudApi if blank(&self.access_token) => Some("access_token"),
            AccountKind::CloudApi if blank(&self.phone_number_id) => Some("phone_number_id"),
            AccountKind::PageApi if blank(&self.access_token) => Some("access_token"),
            AccountKind::PageApi if blank(&self.page_id) => Some("page_id"),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("platform", &self.platform)
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("access_token", &self.access_token.as_ref().map(|_| "****"))
            .field("phone_number_id", &self.phone_number_id)
            .field("page_id", &self.page_id)
            .field("connection_state", &self.connection_state)
            .field("remote_identity", &self.remote_identity)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

/// A pairing challenge awaiting operator action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingChallenge {
    /// Raw pairing code as emitted by the platform.
    pub code: String,
    /// Terminal rendering of the code as a QR image.
    pub rendered: String,
}

/// Point-in-time view of one account's connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub account_id: String,
    pub state: ConnectionState,
    pub remote_identity: Option<String>,
    pub last_error: Option<String>,
    pub pairing: Option<PairingChallenge>,
    pub updated_at: String,
}

impl SessionStatus {
    pub fn disconnected(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            state: ConnectionState::Disconnected,
            remote_identity: None,
            last_error: None,
            pairing: None,
            updated_at: now_timestamp(),
        }
    }
}

// --- Contacts, conversations, messages ---

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContactState {
    New,
    Active,
}

/// A person reachable on one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub platform: Platform,
    pub external_id: String,
    pub name: String,
    pub state: ContactState,
    pub created_at: String,
    pub updated_at: String,
}

/// Display name used when an event carries no sender name.
pub fn placeholder_contact_name(platform: Platform, external_id: &str) -> String {
    match platform {
        Platform::Whatsapp => format!("+{external_id}"),
        Platform::Messenger | Platform::Instagram => format!("{platform} user {external_id}"),
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    Open,
    InProgress,
    Closed,
}

/// A thread between one contact and the business on one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub contact_id: String,
    pub platform: Platform,
    /// Which kind of account carried the conversation (platform sub-kind).
    pub channel_kind: AccountKind,
    pub state: ConversationState,
    pub assigned_agent: Option<String>,
    pub inbound_count: i64,
    pub outbound_count: i64,
    pub message_count: i64,
    pub last_activity_at: String,
    pub created_at: String,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    Sent,
    Delivered,
    Read,
    Failed,
}

impl DeliveryState {
    /// Whether a message in `self` may move to `next`.
    ///
    /// Delivery only moves forward (sent, delivered, read); `failed` is
    /// reachable from any state that is not already `read`.
    pub fn can_advance_to(self, next: DeliveryState) -> bool {
        use DeliveryState::*;
        match (self, next) {
            (Read, _) => false,
            (Failed, _) => false,
            (_, Failed) => true,
            (Sent, Delivered) | (Sent, Read) | (Delivered, Read) => true,
            _ => false,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Audio,
    Video,
    Document,
    Sticker,
    Location,
    Other,
}

impl MessageType {
    /// Maps a platform-reported type name, falling back to [`MessageType::Other`].
    pub fn from_platform(name: &str) -> Self {
        name.parse().unwrap_or(MessageType::Other)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub direction: Direction,
    pub message_type: MessageType,
    pub content: String,
    pub media_url: Option<String>,
    pub delivery_state: DeliveryState,
    pub external_id: Option<String>,
    pub created_at: String,
}

// --- Automation ---

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    MessageReceived,
    NewConversation,
    Keyword,
    ResponseTime,
    ScheduleWindow,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    SendMessage,
    AssignAgent,
    ChangeStatus,
    Tag,
    CallWebhook,
}

/// A trigger/action pair evaluated in priority order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationRule {
    pub id: i64,
    pub name: String,
    pub trigger: TriggerKind,
    pub trigger_param: String,
    pub action: ActionKind,
    pub action_param: String,
    /// Lower numbers are evaluated first.
    pub priority: i64,
    pub active: bool,
    /// Platforms this rule applies to. Empty means every platform.
    pub platforms: BTreeSet<Platform>,
    pub created_at: String,
}

impl AutomationRule {
    pub fn applies_to(&self, platform: Platform) -> bool {
        self.platforms.is_empty() || self.platforms.contains(&platform)
    }
}

/// Input for creating a rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRule {
    pub name: String,
    pub trigger: TriggerKind,
    pub trigger_param: String,
    pub action: ActionKind,
    pub action_param: String,
    pub priority: i64,
    pub active: bool,
    pub platforms: BTreeSet<Platform>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Executed,
    Failed,
}

/// Immutable record of one matched rule's outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationExecution {
    pub id: i64,
    pub rule_id: i64,
    pub conversation_id: String,
    pub message_id: Option<String>,
    pub trigger: TriggerKind,
    pub action: ActionKind,
    pub status: ExecutionStatus,
    pub detail: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewExecution {
    pub rule_id: i64,
    pub conversation_id: String,
    pub message_id: Option<String>,
    pub trigger: TriggerKind,
    pub action: ActionKind,
    pub status: ExecutionStatus,
    pub detail: Option<String>,
}

// --- Audit log ---

/// Append-only record of one raw inbound payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookLogEntry {
    pub id: i64,
    pub platform: Platform,
    /// Producer of the payload: an account kind, or `session` for paired events.
    pub source: String,
    pub payload: String,
    pub received_at: String,
    pub processed_at: Option<String>,
    pub error: Option<String>,
}

// --- Inbound pipeline ---

/// Canonical inbound message after platform normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    pub external_sender_id: String,
    #[serde(default)]
    pub sender_name: Option<String>,
    pub content: String,
    #[serde(rename = "type", default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub external_message_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl InboundEvent {
    /// A plain text event, the common case in tests and session transports.
    pub fn text(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            external_sender_id: sender.into(),
            sender_name: None,
            content: content.into(),
            message_type: MessageType::Text,
            media_url: None,
            external_message_id: None,
            timestamp: None,
        }
    }
}

/// Delivery-state report for a previously sent message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryUpdate {
    pub external_message_id: String,
    pub state: DeliveryState,
}

/// Where an inbound item came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSource {
    pub platform: Platform,
    pub kind: AccountKind,
    pub account_id: Option<String>,
}

/// Unit of work on the ingest queue.
#[derive(Debug, Clone)]
pub enum IngestItem {
    /// An already-normalized message (paired-session transports).
    Event {
        source: EventSource,
        event: InboundEvent,
    },
    /// A delivery-state report (paired-session transports).
    Status {
        source: EventSource,
        update: DeliveryUpdate,
    },
    /// A raw webhook body that still needs normalization.
    Webhook {
        platform: Platform,
        kind: AccountKind,
        payload: serde_json::Value,
    },
}

/// Input to the atomic inbound write.
#[derive(Debug, Clone)]
pub struct NewInbound {
    pub platform: Platform,
    pub channel_kind: AccountKind,
    pub event: InboundEvent,
    /// Reopen the most recent closed conversation instead of creating one.
    pub reuse_closed: bool,
}

/// State committed for one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestRecord {
    pub contact: Contact,
    /// Conversation as it stands after the counters were bumped.
    pub conversation: Conversation,
    pub message: Message,
    pub contact_created: bool,
    pub conversation_created: bool,
}

/// Result of the atomic inbound write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    Stored(Box<IngestRecord>),
    /// The external message id was already stored.
    Duplicate { message_id: String },
}

/// Unit of work on the automation queue.
#[derive(Debug, Clone)]
pub struct AutomationJob {
    pub source: EventSource,
    pub contact: Contact,
    /// Conversation snapshot taken at ingestion time.
    pub conversation: Conversation,
    pub message: Message,
}

/// Input for recording a sent message.
#[derive(Debug, Clone)]
pub struct NewOutbound {
    pub conversation_id: String,
    pub message_type: MessageType,
    pub content: String,
    pub media_url: Option<String>,
    pub external_id: Option<String>,
    pub delivery_state: DeliveryState,
}

// --- Outbound dispatch ---

/// Payload of an outbound send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundContent {
    #[serde(rename = "type", default)]
    pub message_type: MessageType,
    pub text: String,
    #[serde(default)]
    pub media_url: Option<String>,
}

impl OutboundContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            message_type: MessageType::Text,
            text: text.into(),
            media_url: None,
        }
    }
}

/// Who an outbound send goes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SendTarget {
    #[serde(rename_all = "camelCase")]
    Conversation { conversation_id: String },
    Address { platform: Platform, address: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
    pub target: SendTarget,
    pub content: OutboundContent,
}

/// Normalized outcome of a dispatch. Failures are data, never errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResult {
    pub success: bool,
    /// Message id assigned by the platform.
    pub message_id: Option<String>,
    /// Id of the stored outbound message row.
    pub record_id: Option<String>,
    pub provider: Option<AccountKind>,
    pub platform: Option<Platform>,
    pub error: Option<String>,
    pub error_kind: Option<String>,
}

impl SendResult {
    pub fn failure(platform: Option<Platform>, err: &crate::BridgeError) -> Self {
        Self {
            success: false,
            message_id: None,
            record_id: None,
            provider: None,
            platform,
            error: Some(err.to_string()),
            error_kind: Some(err.kind().to_string()),
        }
    }
}
