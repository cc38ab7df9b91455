// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook route tests driven through the router without a socket.

use axum::body::Body;
use http::{Request, StatusCode};
use tokio::sync::mpsc;
use tower::ServiceExt;

use bridgedesk_connection::SessionRegistry;
use bridgedesk_core::StorageAdapter;
use bridgedesk_core::types::{Account, AccountKind, IngestItem, Platform};
use bridgedesk_gateway::{GatewayState, router};
use bridgedesk_ingest::signature::sign;
use bridgedesk_test_utils::TestStorage;

const BODY: &str = r#"{"object":"whatsapp_business_account","entry":[]}"#;

struct Fixture {
    _harness: TestStorage,
    state: GatewayState,
    rx: mpsc::Receiver<IngestItem>,
}

async fn fixture(capacity: usize) -> Fixture {
    let harness = TestStorage::new().await.unwrap();
    let mut account = Account::new("wa-cloud", Platform::Whatsapp, AccountKind::CloudApi);
    account.access_token = Some("token".into());
    account.phone_number_id = Some("100200300".into());
    account.verify_token = Some("verify-me".into());
    account.webhook_secret = Some("app-secret".into());
    harness.activate(&account).await.unwrap();

    let (tx, rx) = mpsc::channel(capacity);
    let state = GatewayState::new(harness.adapter(), tx, SessionRegistry::new());
    Fixture {
        _harness: harness,
        state,
        rx,
    }
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn post(uri: &str, body: &str, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(sig) = signature {
        builder = builder.header("X-Hub-Signature-256", sig);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn handshake_echoes_challenge() {
    let fx = fixture(8).await;
    let response = router(fx.state.clone())
        .oneshot(
            Request::get(
                "/webhooks/whatsapp?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=1158201444",
            )
            .body(Body::empty())
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "1158201444");
}

#[tokio::test]
async fn handshake_rejects_wrong_token() {
    let fx = fixture(8).await;
    let response = router(fx.state.clone())
        .oneshot(
            Request::get("/webhooks/whatsapp?hub.mode=subscribe&hub.verify_token=nope&hub.challenge=1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn signed_delivery_is_queued() {
    let mut fx = fixture(8).await;
    let response = router(fx.state.clone())
        .oneshot(post(
            "/webhooks/whatsapp",
            BODY,
            Some(sign("app-secret", BODY.as_bytes())),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "EVENT_RECEIVED");

    match fx.rx.try_recv().unwrap() {
        IngestItem::Webhook {
            platform,
            kind,
            payload,
        } => {
            assert_eq!(platform, Platform::Whatsapp);
            assert_eq!(kind, AccountKind::CloudApi);
            assert_eq!(payload["object"], "whatsapp_business_account");
        }
        other => panic!("unexpected item {other:?}"),
    }
}

#[tokio::test]
async fn bad_or_missing_signature_is_rejected() {
    let mut fx = fixture(8).await;
    for signature in [None, Some(sign("wrong", BODY.as_bytes()))] {
        let response = router(fx.state.clone())
            .oneshot(post("/webhooks/whatsapp", BODY, signature))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
    assert!(fx.rx.try_recv().is_err());
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let fx = fixture(8).await;
    let body = "not json";
    let response = router(fx.state.clone())
        .oneshot(post(
            "/webhooks/whatsapp",
            body,
            Some(sign("app-secret", body.as_bytes())),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_platform_or_missing_account_is_not_found() {
    let fx = fixture(8).await;
    for uri in ["/webhooks/telegram", "/webhooks/messenger"] {
        let response = router(fx.state.clone())
            .oneshot(post(uri, BODY, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn full_queue_asks_for_redelivery() {
    let fx = fixture(1).await;
    let signed = || Some(sign("app-secret", BODY.as_bytes()));
    let first = router(fx.state.clone())
        .oneshot(post("/webhooks/whatsapp", BODY, signed()))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let second = router(fx.state.clone())
        .oneshot(post("/webhooks/whatsapp", BODY, signed()))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn unsigned_delivery_accepted_without_secret() {
    let harness = TestStorage::new().await.unwrap();
    let account = harness
        .active_account("fb-page", Platform::Messenger, AccountKind::PageApi)
        .await
        .unwrap();
    assert!(account.webhook_secret.is_none());
    let (tx, mut rx) = mpsc::channel(4);
    let state = GatewayState::new(harness.adapter(), tx, SessionRegistry::new());

    let response = router(state)
        .oneshot(post("/webhooks/messenger", r#"{"object":"page","entry":[]}"#, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(matches!(
        rx.try_recv().unwrap(),
        IngestItem::Webhook {
            platform: Platform::Messenger,
            kind: AccountKind::PageApi,
            ..
        }
    ));
}

fn cloud_account(id: &str, phone_number_id: &str, secret: &str) -> Account {
    let mut account = Account::new(id, Platform::Whatsapp, AccountKind::CloudApi);
    account.access_token = Some("token".into());
    account.phone_number_id = Some(phone_number_id.into());
    account.verify_token = Some(format!("verify-{id}"));
    account.webhook_secret = Some(secret.into());
    account
}

#[tokio::test]
async fn cloud_account_receives_while_paired_session_is_active() {
    let harness = TestStorage::new().await.unwrap();
    harness
        .active_account("wa-web", Platform::Whatsapp, AccountKind::PairedSession)
        .await
        .unwrap();
    harness
        .storage
        .upsert_account(&cloud_account("wa-cloud", "100200300", "cloud-secret"))
        .await
        .unwrap();
    let (tx, mut rx) = mpsc::channel(4);
    let state = GatewayState::new(harness.adapter(), tx, SessionRegistry::new());

    let handshake = router(state.clone())
        .oneshot(
            Request::get(
                "/webhooks/whatsapp?hub.mode=subscribe&hub.verify_token=verify-wa-cloud&hub.challenge=77",
            )
            .body(Body::empty())
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(handshake.status(), StatusCode::OK);
    assert_eq!(body_string(handshake).await, "77");

    let response = router(state)
        .oneshot(post(
            "/webhooks/whatsapp",
            BODY,
            Some(sign("cloud-secret", BODY.as_bytes())),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(matches!(
        rx.try_recv().unwrap(),
        IngestItem::Webhook {
            kind: AccountKind::CloudApi,
            ..
        }
    ));
}

#[tokio::test]
async fn delivery_is_checked_against_the_addressed_account() {
    let harness = TestStorage::new().await.unwrap();
    harness
        .activate(&cloud_account("wa-main", "100", "main-secret"))
        .await
        .unwrap();
    harness
        .storage
        .upsert_account(&cloud_account("wa-second", "200", "second-secret"))
        .await
        .unwrap();
    let (tx, mut rx) = mpsc::channel(4);
    let state = GatewayState::new(harness.adapter(), tx, SessionRegistry::new());

    let body = serde_json::json!({
        "object": "whatsapp_business_account",
        "entry": [{ "id": "waba", "changes": [{ "field": "messages", "value": {
            "metadata": { "phone_number_id": "200" }
        }}]}]
    })
    .to_string();

    let wrong = router(state.clone())
        .oneshot(post(
            "/webhooks/whatsapp",
            &body,
            Some(sign("main-secret", body.as_bytes())),
        ))
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let right = router(state)
        .oneshot(post(
            "/webhooks/whatsapp",
            &body,
            Some(sign("second-secret", body.as_bytes())),
        ))
        .await
        .unwrap();
    assert_eq!(right.status(), StatusCode::OK);
    assert!(rx.try_recv().is_ok());
}

#[tokio::test]
async fn paired_session_alone_has_no_webhook_route() {
    let harness = TestStorage::new().await.unwrap();
    harness
        .active_account("wa-web", Platform::Whatsapp, AccountKind::PairedSession)
        .await
        .unwrap();
    let (tx, _rx) = mpsc::channel(4);
    let state = GatewayState::new(harness.adapter(), tx, SessionRegistry::new());
    let response = router(state)
        .oneshot(post("/webhooks/whatsapp", BODY, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_storage_and_sessions() {
    let fx = fixture(8).await;
    let response = router(fx.state.clone())
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["storage"], "healthy");
    assert!(json["sessions"].as_array().unwrap().is_empty());
}
