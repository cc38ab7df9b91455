// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the complete Bridgedesk pipeline.
//!
//! Each test builds the same [`Pipeline`] the binary runs, over a temp
//! SQLite database and a scripted paired session (or a mocked Graph API).
//! Tests are independent and order-insensitive.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use http::{Request, StatusCode};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bridgedesk::Pipeline;
use bridgedesk_config::model::BridgedeskConfig;
use bridgedesk_core::types::{
    Account, AccountKind, ActionKind, ExecutionStatus, InboundEvent, NewRule, OutboundContent,
    Platform, TriggerKind,
};
use bridgedesk_core::{Principal, Role, SessionEvent, StorageAdapter};
use bridgedesk_gateway::router;
use bridgedesk_test_utils::{MockConnector, MockLink, TestStorage};

const CUSTOMER: &str = "5215512345678";

struct Desk {
    harness: TestStorage,
    pipeline: Pipeline,
    link: Arc<MockLink>,
}

/// A pipeline with one connected paired WhatsApp session.
async fn paired_desk() -> Desk {
    let harness = TestStorage::new().await.unwrap();
    harness
        .activate(&Account::new(
            "wa-web",
            Platform::Whatsapp,
            AccountKind::PairedSession,
        ))
        .await
        .unwrap();

    let connector = MockConnector::new();
    let link = MockLink::with_events(vec![SessionEvent::Connected {
        identity: "5215500000000".into(),
    }]);
    connector.push_link(link.clone()).await;

    let pipeline = Pipeline::build(
        &BridgedeskConfig::default(),
        harness.adapter(),
        connector,
        CancellationToken::new(),
    )
    .unwrap();
    let started = pipeline.manager.start("wa-web").await.unwrap();
    assert!(started.success, "session did not connect: {:?}", started.error);

    Desk {
        harness,
        pipeline,
        link,
    }
}

fn supervisor() -> Principal {
    Principal::new("lead", Role::Supervisor)
}

fn reply_rule(name: &str, keywords: &str, reply: &str, priority: i64, active: bool) -> NewRule {
    NewRule {
        name: name.into(),
        trigger: TriggerKind::Keyword,
        trigger_param: keywords.into(),
        action: ActionKind::SendMessage,
        action_param: reply.into(),
        priority,
        active,
        platforms: BTreeSet::new(),
    }
}

impl Desk {
    async fn add_rule(&self, rule: NewRule) -> i64 {
        self.pipeline
            .engine
            .create_rule(Some(&supervisor()), rule)
            .await
            .unwrap()
            .id
    }

    async fn customer_says(&self, content: &str, id: &str) {
        let mut event = InboundEvent::text(CUSTOMER, content);
        event.external_message_id = Some(id.to_string());
        self.link.inject(SessionEvent::Message(event)).await;
    }

    async fn wait_for_sends(&self, count: usize) -> Vec<(String, OutboundContent)> {
        for _ in 0..300 {
            let sent = self.link.sent_messages().await;
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {count} sends on the paired session");
    }

    async fn wait_for_contact(&self) {
        for _ in 0..300 {
            let contact = self
                .harness
                .storage
                .find_contact(Platform::Whatsapp, CUSTOMER)
                .await
                .unwrap();
            if contact.is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("inbound message was never stored");
    }
}

/// The customer's open conversation on the paired session.
async fn conversation_id(harness: &TestStorage) -> String {
    let (_, conversation) = harness
        .storage
        .resolve_for_outbound(Platform::Whatsapp, AccountKind::PairedSession, CUSTOMER)
        .await
        .unwrap();
    conversation.id
}

// ---- Keyword greeting ----

#[tokio::test]
async fn keyword_greeting_replies_on_the_session() {
    let desk = paired_desk().await;
    let rule_id = desk
        .add_rule(reply_rule(
            "greeting",
            "hola, buenas",
            "Bienvenido a Bridgedesk",
            1,
            true,
        ))
        .await;

    desk.customer_says("Hola, quisiera informes", "wamid.e2e.1")
        .await;
    let sent = desk.wait_for_sends(1).await;
    assert_eq!(sent[0].0, CUSTOMER);
    assert_eq!(sent[0].1.text, "Bienvenido a Bridgedesk");

    desk.pipeline.shutdown().await;

    let conversation_id = conversation_id(&desk.harness).await;
    let messages = desk
        .harness
        .storage
        .list_messages(&conversation_id)
        .await
        .unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "Hola, quisiera informes");
    assert_eq!(messages[1].content, "Bienvenido a Bridgedesk");
    assert_eq!(messages[1].external_id.as_deref(), Some("mock-wamid-1"));

    let executions = desk
        .harness
        .storage
        .list_executions(&conversation_id)
        .await
        .unwrap();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].rule_id, rule_id);
    assert_eq!(executions[0].status, ExecutionStatus::Executed);
}

// ---- Inactive rules ----

#[tokio::test]
async fn inactive_rule_does_nothing() {
    let desk = paired_desk().await;
    desk.add_rule(reply_rule("greeting", "hola", "Bienvenido", 1, false))
        .await;

    desk.customer_says("hola", "wamid.e2e.2").await;
    desk.wait_for_contact().await;
    // Shutdown drains both queues, so every job has been evaluated.
    desk.pipeline.shutdown().await;

    assert!(desk.link.sent_messages().await.is_empty());
    let conversation_id = conversation_id(&desk.harness).await;
    assert!(
        desk.harness
            .storage
            .list_executions(&conversation_id)
            .await
            .unwrap()
            .is_empty()
    );
}

// ---- Rule priority ----

#[tokio::test]
async fn lower_priority_number_wins() {
    let desk = paired_desk().await;
    desk.add_rule(reply_rule("generic", "precio", "Un asesor te atiende pronto", 5, true))
        .await;
    let specific = desk
        .add_rule(reply_rule("prices", "precio", "Lista de precios: bit.ly/precios", 1, true))
        .await;

    desk.customer_says("¿Cuál es el precio?", "wamid.e2e.3").await;
    let sent = desk.wait_for_sends(1).await;
    desk.pipeline.shutdown().await;

    assert_eq!(sent.len(), 1, "only the first matching rule runs");
    assert_eq!(sent[0].1.text, "Lista de precios: bit.ly/precios");

    let conversation_id = conversation_id(&desk.harness).await;
    let executions = desk
        .harness
        .storage
        .list_executions(&conversation_id)
        .await
        .unwrap();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].rule_id, specific);
}

// ---- Webhook account ----

#[tokio::test]
async fn cloud_webhook_reply_goes_through_graph_api() {
    let graph = MockServer::start().await;
    let mut config = BridgedeskConfig::default();
    config.dispatch.graph_base_url = graph.uri();

    Mock::given(method("POST"))
        .and(path(format!("/{}/100200300/messages", config.dispatch.api_version)))
        .and(body_partial_json(json!({
            "to": CUSTOMER,
            "type": "text",
            "text": { "body": "Bienvenido" }
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "messages": [{ "id": "wamid.out.1" }] })),
        )
        .expect(1)
        .mount(&graph)
        .await;

    let harness = TestStorage::new().await.unwrap();
    harness
        .active_account("wa-cloud", Platform::Whatsapp, AccountKind::CloudApi)
        .await
        .unwrap();
    let pipeline = Pipeline::build(
        &config,
        harness.adapter(),
        MockConnector::new(),
        CancellationToken::new(),
    )
    .unwrap();
    pipeline
        .engine
        .create_rule(
            Some(&supervisor()),
            reply_rule("greeting", "hola", "Bienvenido", 1, true),
        )
        .await
        .unwrap();

    let body = json!({
        "object": "whatsapp_business_account",
        "entry": [{ "changes": [{ "field": "messages", "value": {
            "contacts": [{ "profile": { "name": "Ana" }, "wa_id": CUSTOMER }],
            "messages": [{
                "from": CUSTOMER,
                "id": "wamid.in.1",
                "timestamp": "1767225600",
                "type": "text",
                "text": { "body": "hola" }
            }]
        }}]}]
    });
    let response = router(pipeline.gateway_state())
        .oneshot(
            Request::post("/webhooks/whatsapp")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Shutdown drains ingestion and automation before returning.
    pipeline.shutdown().await;
    graph.verify().await;

    let contact = harness
        .storage
        .find_contact(Platform::Whatsapp, CUSTOMER)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(contact.name, "Ana");
}
