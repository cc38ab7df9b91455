// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capturing senders for dispatch and automation tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use bridgedesk_core::types::{
    Account, AccountKind, AdapterType, HealthStatus, OutboundContent, SendRequest, SendResult,
};
use bridgedesk_core::{BridgeError, OutboundSender, PlatformSender, PluginAdapter};

/// One call captured by [`RecordingSender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub account_id: String,
    pub recipient: String,
    pub content: OutboundContent,
}

/// A [`PlatformSender`] that records sends instead of calling a platform.
///
/// Queued failures are returned before any send is recorded; an optional
/// delay simulates a slow platform.
pub struct RecordingSender {
    kind: AccountKind,
    identity: String,
    delay: Option<Duration>,
    failures: Mutex<VecDeque<BridgeError>>,
    sent: Mutex<Vec<SentMessage>>,
    next_id: AtomicU64,
}

impl RecordingSender {
    pub fn new(kind: AccountKind) -> Self {
        Self {
            kind,
            identity: format!("mock {kind}"),
            delay: None,
            failures: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Sleep for `delay` inside every send.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Identity returned by `validate`.
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    /// Makes the next send (or validate) fail with `err`.
    pub async fn fail_next(&self, err: BridgeError) {
        self.failures.lock().await.push_back(err);
    }

    pub async fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait]
impl PluginAdapter for RecordingSender {
    fn name(&self) -> &str {
        "recording-sender"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Sender
    }

    async fn health_check(&self) -> Result<HealthStatus, BridgeError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), BridgeError> {
        Ok(())
    }
}

#[async_trait]
impl PlatformSender for RecordingSender {
    fn kind(&self) -> AccountKind {
        self.kind
    }

    async fn send(
        &self,
        account: &Account,
        recipient: &str,
        content: &OutboundContent,
    ) -> Result<String, BridgeError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.failures.lock().await.pop_front() {
            return Err(err);
        }
        self.sent.lock().await.push(SentMessage {
            account_id: account.id.clone(),
            recipient: recipient.to_string(),
            content: content.clone(),
        });
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(format!("mock-{}-{n}", self.kind))
    }

    async fn validate(&self, _account: &Account) -> Result<String, BridgeError> {
        if let Some(err) = self.failures.lock().await.pop_front() {
            return Err(err);
        }
        Ok(self.identity.clone())
    }
}

/// An [`OutboundSender`] that records requests and answers with a canned result.
pub struct RecordingOutbound {
    requests: Mutex<Vec<SendRequest>>,
    fail_with: Mutex<Option<BridgeError>>,
}

impl RecordingOutbound {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            fail_with: Mutex::new(None),
        }
    }

    /// Makes every subsequent send report `err`.
    pub async fn fail_with(&self, err: BridgeError) {
        *self.fail_with.lock().await = Some(err);
    }

    pub async fn requests(&self) -> Vec<SendRequest> {
        self.requests.lock().await.clone()
    }
}

impl Default for RecordingOutbound {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutboundSender for RecordingOutbound {
    async fn send(&self, request: SendRequest) -> SendResult {
        let mut requests = self.requests.lock().await;
        requests.push(request);
        if let Some(err) = self.fail_with.lock().await.as_ref() {
            return SendResult::failure(None, err);
        }
        SendResult {
            success: true,
            message_id: Some(format!("mock-out-{}", requests.len())),
            record_id: Some(uuid::Uuid::new_v4().to_string()),
            provider: None,
            platform: None,
            error: None,
            error_kind: None,
        }
    }
}
