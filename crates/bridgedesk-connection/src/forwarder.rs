// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordered hand-off from one session to the shared ingest queue.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use bridgedesk_core::types::IngestItem;

/// Bounded per-session buffer in front of the ingest queue.
///
/// The session loop only pushes without waiting. A single task moves items
/// into the ingest queue in push order, so one contact's events reach
/// ingestion in the order the session read them. A push onto a full
/// buffer drops the item.
pub(crate) struct Forwarder {
    account_id: String,
    buffer: mpsc::Sender<IngestItem>,
    task: JoinHandle<()>,
}

impl Forwarder {
    pub(crate) fn spawn(
        account_id: &str,
        ingest: mpsc::Sender<IngestItem>,
        capacity: usize,
    ) -> Self {
        let (buffer, mut pending) = mpsc::channel::<IngestItem>(capacity);
        let owner = account_id.to_string();
        let task = tokio::spawn(async move {
            while let Some(item) = pending.recv().await {
                if ingest.send(item).await.is_err() {
                    warn!(
                        account_id = %owner,
                        buffered = pending.len(),
                        "ingest queue closed, buffered events discarded"
                    );
                    break;
                }
            }
            debug!(account_id = %owner, "ingest forwarder finished");
        });
        Self {
            account_id: account_id.to_string(),
            buffer,
            task,
        }
    }

    /// Queues `item` without waiting. Returns `false` if it was dropped.
    pub(crate) fn push(&self, item: IngestItem) -> bool {
        match self.buffer.try_send(item) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(
                    account_id = %self.account_id,
                    capacity = self.buffer.max_capacity(),
                    "session overflow buffer full, event dropped"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!(account_id = %self.account_id, "ingest forwarder stopped, event dropped");
                false
            }
        }
    }

    /// Waits until every buffered item has reached the ingest queue.
    pub(crate) async fn flush(self) {
        let Forwarder {
            account_id,
            buffer,
            task,
        } = self;
        drop(buffer);
        if let Err(e) = task.await {
            warn!(account_id = %account_id, error = %e, "ingest forwarder panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridgedesk_core::types::{AccountKind, EventSource, InboundEvent, Platform};

    fn item(n: usize) -> IngestItem {
        IngestItem::Event {
            source: EventSource {
                platform: Platform::Whatsapp,
                kind: AccountKind::PairedSession,
                account_id: Some("wa-web".into()),
            },
            event: InboundEvent::text("521", format!("msg {n}")),
        }
    }

    fn content(item: IngestItem) -> String {
        match item {
            IngestItem::Event { event, .. } => event.content,
            other => panic!("unexpected item {other:?}"),
        }
    }

    #[tokio::test]
    async fn keeps_push_order_behind_a_full_queue() {
        let (ingest, mut rx) = mpsc::channel(1);
        let forwarder = Forwarder::spawn("wa-web", ingest, 64);
        for n in 0..20 {
            assert!(forwarder.push(item(n)));
        }
        let drained = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(item) = rx.recv().await {
                seen.push(content(item));
            }
            seen
        });
        forwarder.flush().await;

        let expected: Vec<String> = (0..20).map(|n| format!("msg {n}")).collect();
        assert_eq!(drained.await.unwrap(), expected);
    }

    #[tokio::test]
    async fn full_buffer_drops_instead_of_growing() {
        let (ingest, mut rx) = mpsc::channel(1);
        let forwarder = Forwarder::spawn("wa-web", ingest, 2);
        let accepted = (0..10).filter(|n| forwarder.push(item(*n))).count();
        // One item in the queue, one held by the task, two buffered.
        assert!(accepted <= 4, "accepted {accepted}");
        assert!(accepted >= 2);

        let drained = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(item) = rx.recv().await {
                seen.push(content(item));
            }
            seen
        });
        forwarder.flush().await;
        let seen = drained.await.unwrap();
        assert_eq!(seen.len(), accepted);
        let expected: Vec<String> = (0..accepted).map(|n| format!("msg {n}")).collect();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn closed_ingest_queue_drops_pushes() {
        let (ingest, rx) = mpsc::channel(1);
        drop(rx);
        let forwarder = Forwarder::spawn("wa-web", ingest, 4);
        assert!(forwarder.push(item(0)));
        forwarder.flush().await;
    }
}
