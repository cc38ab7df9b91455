// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Bridgedesk.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use bridgedesk_core::types::{Account, AccountKind, Platform};
use serde::{Deserialize, Serialize};

/// Top-level Bridgedesk configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BridgedeskConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Paired-session lifecycle settings.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Ingestion and automation queue settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Outbound REST settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Webhook HTTP receiver settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Platform accounts, synced into storage at startup.
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Instance name, used in log lines.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "bridgedesk".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// How long a statement waits on a locked database.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("bridgedesk").join("bridgedesk.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("bridgedesk.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

/// Paired-session lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Fixed delay before reconnecting after a transient disconnect.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    /// Upper bound for `start` to reach a connected or failed state.
    #[serde(default = "default_start_timeout_secs")]
    pub start_timeout_secs: u64,

    /// Upper bound for a session actor to wind down on `stop`.
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,

    /// Capacity of each session actor's command channel.
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,

    /// Inbound events each session may hold while the ingest queue is full.
    /// Events beyond this are dropped with a warning.
    #[serde(default = "default_overflow_buffer")]
    pub overflow_buffer: usize,
}

impl ConnectionConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_secs(self.start_timeout_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_secs: default_reconnect_delay_secs(),
            start_timeout_secs: default_start_timeout_secs(),
            stop_timeout_secs: default_stop_timeout_secs(),
            command_buffer: default_command_buffer(),
            overflow_buffer: default_overflow_buffer(),
        }
    }
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_start_timeout_secs() -> u64 {
    60
}

fn default_stop_timeout_secs() -> u64 {
    5
}

fn default_command_buffer() -> usize {
    32
}

fn default_overflow_buffer() -> usize {
    256
}

/// Ingestion and automation queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default = "default_queue_capacity")]
    pub ingest_queue_capacity: usize,

    #[serde(default = "default_queue_capacity")]
    pub automation_queue_capacity: usize,

    /// Maximum automation jobs running at once.
    #[serde(default = "default_automation_concurrency")]
    pub automation_concurrency: usize,

    /// Reopen the most recent closed conversation on a new inbound message.
    /// When off, a fresh conversation is started instead.
    #[serde(default = "default_reuse_closed")]
    pub reuse_closed_conversations: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ingest_queue_capacity: default_queue_capacity(),
            automation_queue_capacity: default_queue_capacity(),
            automation_concurrency: default_automation_concurrency(),
            reuse_closed_conversations: default_reuse_closed(),
        }
    }
}

fn default_reuse_closed() -> bool {
    true
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_automation_concurrency() -> usize {
    8
}

/// Outbound REST configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Base URL of the graph API used by cloud-API and page-API accounts.
    #[serde(default = "default_graph_base_url")]
    pub graph_base_url: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Upper bound for a single platform send.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,

    /// Upper bound for the automation webhook call.
    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,
}

impl DispatchConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            graph_base_url: default_graph_base_url(),
            api_version: default_api_version(),
            send_timeout_secs: default_send_timeout_secs(),
            webhook_timeout_secs: default_webhook_timeout_secs(),
        }
    }
}

fn default_graph_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_api_version() -> String {
    "v21.0".to_string()
}

fn default_send_timeout_secs() -> u64 {
    15
}

fn default_webhook_timeout_secs() -> u64 {
    10
}

/// Webhook HTTP receiver configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_enabled")]
    pub enabled: bool,

    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: default_gateway_enabled(),
            host: default_gateway_host(),
            port: default_gateway_port(),
        }
    }
}

fn default_gateway_enabled() -> bool {
    true
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    8080
}

/// One platform account.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AccountConfig {
    pub id: String,
    pub platform: Platform,
    pub kind: AccountKind,

    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub access_token: Option<String>,

    /// Cloud-API sending number id.
    #[serde(default)]
    pub phone_number_id: Option<String>,

    /// Page-API page id.
    #[serde(default)]
    pub page_id: Option<String>,

    /// Secret used to verify `X-Hub-Signature-256` on inbound webhooks.
    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// Token echoed back during the webhook subscription handshake.
    #[serde(default)]
    pub verify_token: Option<String>,

    /// Claim the platform's active slot at startup.
    #[serde(default)]
    pub active: bool,
}

impl AccountConfig {
    /// Builds the storage row for this account in its initial state.
    pub fn to_account(&self) -> Account {
        let mut account = Account::new(self.id.clone(), self.platform, self.kind);
        if let Some(label) = &self.label {
            account.label = label.clone();
        }
        account.access_token = self.access_token.clone();
        account.phone_number_id = self.phone_number_id.clone();
        account.page_id = self.page_id.clone();
        account.webhook_secret = self.webhook_secret.clone();
        account.verify_token = self.verify_token.clone();
        account
    }
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("id", &self.id)
            .field("platform", &self.platform)
            .field("kind", &self.kind)
            .field("access_token", &self.access_token.as_ref().map(|_| "****"))
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "****"))
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}
