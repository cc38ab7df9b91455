// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound item processing.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use bridgedesk_config::model::PipelineConfig;
use bridgedesk_core::types::{
    AccountKind, AutomationJob, DeliveryUpdate, EventSource, InboundEvent, InboundOutcome,
    IngestItem, NewInbound, WebhookLogEntry,
};
use bridgedesk_core::{BridgeError, StorageAdapter};

use crate::normalize::{Normalized, normalize};

/// Audit-log source name for items produced by paired sessions.
pub const SESSION_SOURCE: &str = "session";

/// Audit-log body of a paired-session item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionPayload {
    Message(InboundEvent),
    Status(DeliveryUpdate),
}

/// Counts for one processed item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub stored: usize,
    pub duplicates: usize,
    pub statuses: usize,
    pub failed: usize,
}

impl IngestReport {
    fn absorb(&mut self, other: IngestReport) {
        self.stored += other.stored;
        self.duplicates += other.duplicates;
        self.statuses += other.statuses;
        self.failed += other.failed;
    }
}

/// Persists inbound items and hands stored messages to automation.
pub struct Ingestor {
    storage: Arc<dyn StorageAdapter>,
    automation: mpsc::Sender<AutomationJob>,
    reuse_closed: bool,
}

impl Ingestor {
    pub fn new(storage: Arc<dyn StorageAdapter>, automation: mpsc::Sender<AutomationJob>) -> Self {
        Self {
            storage,
            automation,
            reuse_closed: true,
        }
    }

    pub fn from_config(
        storage: Arc<dyn StorageAdapter>,
        automation: mpsc::Sender<AutomationJob>,
        config: &PipelineConfig,
    ) -> Self {
        Self::new(storage, automation).with_reuse_closed(config.reuse_closed_conversations)
    }

    /// Whether a new inbound message reopens the contact's most recent
    /// closed conversation. On by default; when off a new one is created.
    pub fn with_reuse_closed(mut self, reuse_closed: bool) -> Self {
        self.reuse_closed = reuse_closed;
        self
    }

    /// Audits and processes one item.
    ///
    /// Only a failure to append to the audit log is returned as an error.
    /// Failures after that are recorded on the audit entry and counted in
    /// the report.
    pub async fn ingest(&self, item: IngestItem) -> Result<IngestReport, BridgeError> {
        let (source, label, payload) = match &item {
            IngestItem::Event { source, event } => (
                source.clone(),
                SESSION_SOURCE.to_string(),
                encode(&SessionPayload::Message(event.clone()))?,
            ),
            IngestItem::Status { source, update } => (
                source.clone(),
                SESSION_SOURCE.to_string(),
                encode(&SessionPayload::Status(update.clone()))?,
            ),
            IngestItem::Webhook {
                platform,
                kind,
                payload,
            } => (
                EventSource {
                    platform: *platform,
                    kind: *kind,
                    account_id: None,
                },
                kind.to_string(),
                encode(payload)?,
            ),
        };

        let entry_id = self
            .storage
            .append_webhook(source.platform, &label, &payload)
            .await
            .map_err(|e| {
                error!(platform = %source.platform, error = %e, "failed to append audit entry");
                e
            })?;

        let normalized = match item {
            IngestItem::Event { event, .. } => Normalized {
                events: vec![event],
                statuses: Vec::new(),
            },
            IngestItem::Status { update, .. } => Normalized {
                events: Vec::new(),
                statuses: vec![update],
            },
            IngestItem::Webhook { kind, payload, .. } => normalize(kind, &payload),
        };
        Ok(self.process_entry(entry_id, &source, normalized).await)
    }

    /// Re-processes up to `limit` audit entries that carry an error.
    ///
    /// Messages that were stored on an earlier attempt are skipped as
    /// duplicates. Returns the summed report.
    pub async fn replay_failed(&self, limit: usize) -> Result<IngestReport, BridgeError> {
        let entries = self.storage.failed_webhooks(limit).await?;
        info!(count = entries.len(), "replaying failed audit entries");
        let mut total = IngestReport::default();
        for entry in entries {
            let id = entry.id;
            match decode_entry(&entry) {
                Ok((kind, normalized)) => {
                    let source = EventSource {
                        platform: entry.platform,
                        kind,
                        account_id: None,
                    };
                    let report = self.process_entry(id, &source, normalized).await;
                    total.absorb(report);
                }
                Err(e) => {
                    warn!(entry_id = id, error = %e, "audit entry cannot be decoded");
                    self.mark_failed(id, &e.to_string()).await;
                    total.failed += 1;
                }
            }
        }
        Ok(total)
    }

    async fn process_entry(
        &self,
        entry_id: i64,
        source: &EventSource,
        normalized: Normalized,
    ) -> IngestReport {
        let mut report = IngestReport::default();
        let mut errors = Vec::new();

        for event in normalized.events {
            match self.process_event(source, event).await {
                Ok(true) => report.stored += 1,
                Ok(false) => report.duplicates += 1,
                Err(e) => {
                    report.failed += 1;
                    errors.push(e.to_string());
                }
            }
        }
        for update in normalized.statuses {
            match self
                .storage
                .update_delivery_state(&update.external_message_id, update.state)
                .await
            {
                Ok(changed) => {
                    debug!(
                        external_id = %update.external_message_id,
                        state = %update.state,
                        changed,
                        "delivery update applied"
                    );
                    report.statuses += 1;
                }
                Err(e) => {
                    report.failed += 1;
                    errors.push(e.to_string());
                }
            }
        }

        if errors.is_empty() {
            if let Err(e) = self.storage.mark_webhook_processed(entry_id).await {
                warn!(entry_id, error = %e, "failed to stamp audit entry");
            }
        } else {
            warn!(entry_id, errors = errors.len(), "inbound item failed");
            self.mark_failed(entry_id, &errors.join("; ")).await;
        }
        report
    }

    /// Persists one event. Returns `false` for a duplicate.
    async fn process_event(
        &self,
        source: &EventSource,
        event: InboundEvent,
    ) -> Result<bool, BridgeError> {
        let outcome = self
            .storage
            .record_inbound(NewInbound {
                platform: source.platform,
                channel_kind: source.kind,
                event,
                reuse_closed: self.reuse_closed,
            })
            .await?;

        match outcome {
            InboundOutcome::Duplicate { message_id } => {
                info!(message_id = %message_id, "duplicate inbound message skipped");
                Ok(false)
            }
            InboundOutcome::Stored(record) => {
                let record = *record;
                debug!(
                    platform = %source.platform,
                    contact_id = %record.contact.id,
                    conversation_id = %record.conversation.id,
                    contact_created = record.contact_created,
                    conversation_created = record.conversation_created,
                    "inbound message stored"
                );
                self.hand_off(AutomationJob {
                    source: source.clone(),
                    contact: record.contact,
                    conversation: record.conversation,
                    message: record.message,
                })
                .await;
                Ok(true)
            }
        }
    }

    /// Queues a job for automation, waiting for capacity when it is full.
    ///
    /// Ingestion runs on its own worker, so waiting here slows only the
    /// ingest queue, never a session's read loop.
    async fn hand_off(&self, job: AutomationJob) {
        let conversation_id = job.conversation.id.clone();
        if self.automation.send(job).await.is_err() {
            warn!(conversation_id = %conversation_id, "automation queue closed, job dropped");
        }
    }

    async fn mark_failed(&self, entry_id: i64, message: &str) {
        if let Err(e) = self.storage.mark_webhook_failed(entry_id, message).await {
            error!(entry_id, error = %e, "failed to annotate audit entry");
        }
    }
}

fn encode<T: Serialize>(value: &T) -> Result<String, BridgeError> {
    serde_json::to_string(value)
        .map_err(|e| BridgeError::Internal(format!("inbound payload not serializable: {e}")))
}

fn decode_entry(entry: &WebhookLogEntry) -> Result<(AccountKind, Normalized), BridgeError> {
    if entry.source == SESSION_SOURCE {
        let payload: SessionPayload = serde_json::from_str(&entry.payload)
            .map_err(|e| BridgeError::Validation(format!("session payload: {e}")))?;
        let normalized = match payload {
            SessionPayload::Message(event) => Normalized {
                events: vec![event],
                statuses: Vec::new(),
            },
            SessionPayload::Status(update) => Normalized {
                events: Vec::new(),
                statuses: vec![update],
            },
        };
        return Ok((AccountKind::PairedSession, normalized));
    }

    let kind: AccountKind = entry
        .source
        .parse()
        .map_err(|_| BridgeError::Validation(format!("unknown source {}", entry.source)))?;
    let payload = serde_json::from_str(&entry.payload)
        .map_err(|e| BridgeError::Validation(format!("webhook payload: {e}")))?;
    Ok((kind, normalize(kind, &payload)))
}
