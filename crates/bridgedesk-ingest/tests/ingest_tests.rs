// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ingestion pipeline tests against real SQLite storage.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

use bridgedesk_core::types::{
    AccountKind, AutomationJob, ContactState, ConversationState, DeliveryState, DeliveryUpdate,
    EventSource, InboundEvent, IngestItem, MessageType, NewOutbound, Platform,
};
use bridgedesk_core::StorageAdapter;
use bridgedesk_ingest::{IngestWorker, Ingestor, SessionPayload};
use bridgedesk_test_utils::TestStorage;

struct Fixture {
    harness: TestStorage,
    ingestor: Ingestor,
    jobs: mpsc::Receiver<AutomationJob>,
}

async fn fixture() -> Fixture {
    let harness = TestStorage::new().await.unwrap();
    let (tx, jobs) = mpsc::channel(16);
    let ingestor = Ingestor::new(harness.adapter(), tx);
    Fixture {
        harness,
        ingestor,
        jobs,
    }
}

fn session_source() -> EventSource {
    EventSource {
        platform: Platform::Whatsapp,
        kind: AccountKind::PairedSession,
        account_id: Some("wa-web".into()),
    }
}

fn session_event(sender: &str, content: &str, id: &str) -> IngestItem {
    let mut event = InboundEvent::text(sender, content);
    event.external_message_id = Some(id.to_string());
    IngestItem::Event {
        source: session_source(),
        event,
    }
}

fn cloud_webhook(messages: Value) -> IngestItem {
    IngestItem::Webhook {
        platform: Platform::Whatsapp,
        kind: AccountKind::CloudApi,
        payload: json!({
            "object": "whatsapp_business_account",
            "entry": [{ "changes": [{ "field": "messages", "value": {
                "contacts": [{ "profile": { "name": "Ana López" }, "wa_id": "5215512345678" }],
                "messages": messages
            }}]}]
        }),
    }
}

#[tokio::test]
async fn session_event_is_audited_stored_and_handed_off() {
    let mut fx = fixture().await;

    let report = fx
        .ingestor
        .ingest(session_event("5215512345678", "hola", "wamid.1"))
        .await
        .unwrap();
    assert_eq!(report.stored, 1);
    assert_eq!(report.failed, 0);

    let job = fx.jobs.try_recv().expect("job handed to automation");
    assert_eq!(job.message.content, "hola");
    assert_eq!(job.conversation.message_count, 1);
    assert_eq!(job.contact.name, "+5215512345678");
    assert_eq!(job.contact.state, ContactState::New);
    assert_eq!(job.source.kind, AccountKind::PairedSession);
    assert_eq!(job.source.account_id.as_deref(), Some("wa-web"));

    let entry = fx.harness.storage.get_webhook(1).await.unwrap().unwrap();
    assert_eq!(entry.source, "session");
    assert!(entry.processed_at.is_some());
    assert!(entry.error.is_none());
    let payload: SessionPayload = serde_json::from_str(&entry.payload).unwrap();
    assert!(matches!(payload, SessionPayload::Message(e) if e.content == "hola"));
}

#[tokio::test]
async fn same_sender_resolves_to_one_contact_and_conversation() {
    let mut fx = fixture().await;
    fx.ingestor
        .ingest(session_event("5215512345678", "hola", "wamid.1"))
        .await
        .unwrap();
    fx.ingestor
        .ingest(session_event("5215512345678", "¿siguen abiertos?", "wamid.2"))
        .await
        .unwrap();

    let first = fx.jobs.try_recv().unwrap();
    let second = fx.jobs.try_recv().unwrap();
    assert_eq!(first.contact.id, second.contact.id);
    assert_eq!(first.conversation.id, second.conversation.id);
    assert_eq!(second.conversation.message_count, 2);
    assert_eq!(second.conversation.inbound_count, 2);

    let messages = fx
        .harness
        .storage
        .list_messages(&first.conversation.id)
        .await
        .unwrap();
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().all(|m| m.delivery_state == DeliveryState::Delivered));
}

#[tokio::test]
#[traced_test]
async fn duplicate_external_id_is_skipped_without_automation() {
    let mut fx = fixture().await;
    fx.ingestor
        .ingest(session_event("521", "hola", "wamid.dup"))
        .await
        .unwrap();
    let report = fx
        .ingestor
        .ingest(session_event("521", "hola", "wamid.dup"))
        .await
        .unwrap();

    assert_eq!(report.stored, 0);
    assert_eq!(report.duplicates, 1);
    assert!(fx.jobs.try_recv().is_ok());
    assert!(fx.jobs.try_recv().is_err(), "duplicate must not reach automation");
    assert!(logs_contain("duplicate inbound message skipped"));

    // Both deliveries stay in the audit log.
    let second = fx.harness.storage.get_webhook(2).await.unwrap().unwrap();
    assert!(second.processed_at.is_some());
}

#[tokio::test]
async fn cloud_webhook_uses_profile_name() {
    let mut fx = fixture().await;
    let report = fx
        .ingestor
        .ingest(cloud_webhook(json!([{
            "from": "5215512345678",
            "id": "wamid.C1",
            "timestamp": "1700000000",
            "type": "text",
            "text": { "body": "Buenas tardes" }
        }])))
        .await
        .unwrap();
    assert_eq!(report.stored, 1);

    let job = fx.jobs.try_recv().unwrap();
    assert_eq!(job.contact.name, "Ana López");
    assert_eq!(job.source.kind, AccountKind::CloudApi);
    assert_eq!(job.conversation.channel_kind, AccountKind::CloudApi);
    assert_eq!(job.message.external_id.as_deref(), Some("wamid.C1"));

    let entry = fx.harness.storage.get_webhook(1).await.unwrap().unwrap();
    assert_eq!(entry.source, "cloud_api");
    let raw: Value = serde_json::from_str(&entry.payload).unwrap();
    assert_eq!(raw["object"], "whatsapp_business_account");
}

#[tokio::test]
async fn page_webhook_media_message() {
    let mut fx = fixture().await;
    let item = IngestItem::Webhook {
        platform: Platform::Instagram,
        kind: AccountKind::PageApi,
        payload: json!({
            "object": "instagram",
            "entry": [{ "messaging": [{
                "sender": { "id": "IGSID-7" },
                "message": {
                    "mid": "m_ig_1",
                    "attachments": [{ "type": "image", "payload": { "url": "https://cdn.example/p.jpg" } }]
                }
            }]}]
        }),
    };
    fx.ingestor.ingest(item).await.unwrap();

    let job = fx.jobs.try_recv().unwrap();
    assert_eq!(job.contact.platform, Platform::Instagram);
    assert_eq!(job.contact.name, "instagram user IGSID-7");
    assert_eq!(job.message.message_type, MessageType::Image);
    assert_eq!(
        job.message.media_url.as_deref(),
        Some("https://cdn.example/p.jpg")
    );
}

#[tokio::test]
async fn delivery_updates_move_forward_only() {
    let fx = fixture().await;
    let storage = fx.harness.storage.clone();
    let (_, conversation) = storage
        .resolve_for_outbound(Platform::Whatsapp, AccountKind::PairedSession, "521")
        .await
        .unwrap();
    storage
        .record_outbound(NewOutbound {
            conversation_id: conversation.id.clone(),
            message_type: MessageType::Text,
            content: "Bienvenido".into(),
            media_url: None,
            external_id: Some("wamid.out".into()),
            delivery_state: DeliveryState::Sent,
        })
        .await
        .unwrap();

    let status = |state| IngestItem::Status {
        source: session_source(),
        update: DeliveryUpdate {
            external_message_id: "wamid.out".into(),
            state,
        },
    };
    fx.ingestor.ingest(status(DeliveryState::Read)).await.unwrap();
    let report = fx
        .ingestor
        .ingest(status(DeliveryState::Delivered))
        .await
        .unwrap();
    assert_eq!(report.statuses, 1);

    let messages = storage.list_messages(&conversation.id).await.unwrap();
    assert_eq!(messages[0].delivery_state, DeliveryState::Read);
}

#[tokio::test]
async fn replay_processes_failed_entries() {
    let mut fx = fixture().await;
    let storage = fx.harness.storage.clone();
    let payload = serde_json::to_string(&SessionPayload::Message({
        let mut event = InboundEvent::text("5215500000000", "hola");
        event.external_message_id = Some("wamid.replay".into());
        event
    }))
    .unwrap();
    let id = storage
        .append_webhook(Platform::Whatsapp, "session", &payload)
        .await
        .unwrap();
    storage
        .mark_webhook_failed(id, "persistence error: database is locked")
        .await
        .unwrap();

    let report = fx.ingestor.replay_failed(10).await.unwrap();
    assert_eq!(report.stored, 1);
    assert!(fx.jobs.try_recv().is_ok());

    let entry = storage.get_webhook(id).await.unwrap().unwrap();
    assert!(entry.error.is_none());
    assert!(entry.processed_at.is_some());
    assert!(storage.failed_webhooks(10).await.unwrap().is_empty());

    // A second replay finds nothing to do.
    let again = fx.ingestor.replay_failed(10).await.unwrap();
    assert_eq!(again, Default::default());
}

#[tokio::test]
async fn undecodable_entry_stays_annotated() {
    let fx = fixture().await;
    let storage = fx.harness.storage.clone();
    let id = storage
        .append_webhook(Platform::Whatsapp, "cloud_api", "not json")
        .await
        .unwrap();
    storage.mark_webhook_failed(id, "first failure").await.unwrap();

    let report = fx.ingestor.replay_failed(10).await.unwrap();
    assert_eq!(report.failed, 1);
    let entry = storage.get_webhook(id).await.unwrap().unwrap();
    assert!(entry.error.unwrap().contains("webhook payload"));
    assert!(entry.processed_at.is_none());
}

/// Ingests one message, closes its conversation, then ingests a second.
async fn message_after_close(
    ingestor: &Ingestor,
    harness: &TestStorage,
    jobs: &mut mpsc::Receiver<AutomationJob>,
) -> (AutomationJob, AutomationJob) {
    ingestor
        .ingest(session_event("521", "hola", "wamid.r1"))
        .await
        .unwrap();
    let first = jobs.try_recv().unwrap();
    harness
        .storage
        .set_conversation_state(&first.conversation.id, ConversationState::Closed)
        .await
        .unwrap();

    ingestor
        .ingest(session_event("521", "otra vez", "wamid.r2"))
        .await
        .unwrap();
    let second = jobs.try_recv().unwrap();
    (first, second)
}

#[tokio::test]
async fn inbound_message_reopens_closed_conversation() {
    let mut fx = fixture().await;
    let (first, second) = message_after_close(&fx.ingestor, &fx.harness, &mut fx.jobs).await;

    assert_eq!(second.conversation.id, first.conversation.id);
    assert_eq!(second.conversation.state, ConversationState::Open);
    assert_eq!(second.conversation.inbound_count, 2);
    let stored = fx
        .harness
        .storage
        .get_conversation(&first.conversation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.state, ConversationState::Open);
}

#[tokio::test]
async fn reopening_can_be_turned_off() {
    let harness = TestStorage::new().await.unwrap();
    let (tx, mut jobs) = mpsc::channel(16);
    let ingestor = Ingestor::new(harness.adapter(), tx).with_reuse_closed(false);
    let (first, second) = message_after_close(&ingestor, &harness, &mut jobs).await;

    assert_ne!(second.conversation.id, first.conversation.id);
    assert_eq!(second.conversation.state, ConversationState::Open);
    let old = harness
        .storage
        .get_conversation(&first.conversation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(old.state, ConversationState::Closed);
}

#[tokio::test]
async fn full_automation_queue_applies_backpressure_in_order() {
    let harness = TestStorage::new().await.unwrap();
    let (tx, mut jobs) = mpsc::channel(1);
    let ingestor = Arc::new(Ingestor::new(harness.adapter(), tx));

    let producer = {
        let ingestor = ingestor.clone();
        tokio::spawn(async move {
            for n in 0..5 {
                let report = ingestor
                    .ingest(session_event("521", &format!("msg {n}"), &format!("wamid.f{n}")))
                    .await
                    .unwrap();
                assert_eq!(report.stored, 1);
            }
        })
    };

    // With nobody reading, the producer parks on the second hand-off.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!producer.is_finished());

    let mut seen = Vec::new();
    while seen.len() < 5 {
        let job = tokio::time::timeout(Duration::from_secs(5), jobs.recv())
            .await
            .unwrap()
            .unwrap();
        seen.push(job.message.content);
    }
    producer.await.unwrap();
    let expected: Vec<String> = (0..5).map(|n| format!("msg {n}")).collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn worker_drains_queue_and_stops_on_cancel() {
    let harness = TestStorage::new().await.unwrap();
    let (job_tx, mut jobs) = mpsc::channel(16);
    let ingestor = Arc::new(Ingestor::new(harness.adapter(), job_tx));
    let (tx, rx) = mpsc::channel(16);
    let cancel = CancellationToken::new();
    let handle = IngestWorker::new(ingestor, rx, cancel.clone()).spawn();

    tx.send(session_event("521", "hola", "wamid.w1")).await.unwrap();
    let job = tokio::time::timeout(Duration::from_secs(5), jobs.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.message.content, "hola");

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}
