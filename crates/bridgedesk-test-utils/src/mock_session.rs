// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted paired-session transport.
//!
//! `MockConnector` hands out [`MockLink`]s in the order they were queued.
//! Each link replays injected [`SessionEvent`]s from `next_event()` and
//! captures everything passed to `send()`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use bridgedesk_core::types::{Account, OutboundContent};
use bridgedesk_core::{BridgeError, SessionConnector, SessionEvent, SessionLink};

/// One scripted session.
pub struct MockLink {
    events: Mutex<VecDeque<SessionEvent>>,
    sent: Mutex<Vec<(String, OutboundContent)>>,
    notify: Notify,
    closed: AtomicBool,
    fail_sends: AtomicBool,
    next_id: AtomicU64,
}

impl MockLink {
    pub fn new() -> Arc<Self> {
        Self::with_events(Vec::new())
    }

    /// A link that replays `events` before waiting for injected ones.
    pub fn with_events(events: Vec<SessionEvent>) -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(events.into()),
            sent: Mutex::new(Vec::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        })
    }

    /// Queues an event for the next `next_event()` call.
    pub async fn inject(&self, event: SessionEvent) {
        self.events.lock().await.push_back(event);
        self.notify.notify_one();
    }

    /// Messages passed to `send()`, as `(recipient, content)`.
    pub async fn sent_messages(&self) -> Vec<(String, OutboundContent)> {
        self.sent.lock().await.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Makes subsequent sends fail with a transient error.
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionLink for MockLink {
    async fn next_event(&self) -> Option<SessionEvent> {
        loop {
            if self.is_closed() {
                return None;
            }
            {
                let mut queue = self.events.lock().await;
                if let Some(event) = queue.pop_front() {
                    return Some(event);
                }
            }
            self.notify.notified().await;
        }
    }

    async fn send(
        &self,
        recipient: &str,
        content: &OutboundContent,
    ) -> Result<String, BridgeError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(BridgeError::transient("mock link send failure"));
        }
        self.sent
            .lock()
            .await
            .push((recipient.to_string(), content.clone()));
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(format!("mock-wamid-{n}"))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }
}

/// Delegates to a shared [`MockLink`] so tests keep a handle after `connect`.
struct SharedLink(Arc<MockLink>);

#[async_trait]
impl SessionLink for SharedLink {
    async fn next_event(&self) -> Option<SessionEvent> {
        self.0.next_event().await
    }

    async fn send(
        &self,
        recipient: &str,
        content: &OutboundContent,
    ) -> Result<String, BridgeError> {
        self.0.send(recipient, content).await
    }

    async fn close(&self) {
        self.0.close().await
    }
}

/// A recorded `connect()` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectCall {
    pub account_id: String,
    pub credentials: Option<String>,
}

/// Hands out queued links (or connection failures) in order.
///
/// When the queue is empty a fresh silent link is created, so a reconnect
/// in a test never fails unless a failure was queued explicitly.
pub struct MockConnector {
    queue: Mutex<VecDeque<Result<Arc<MockLink>, String>>>,
    links: Mutex<Vec<Arc<MockLink>>>,
    calls: Mutex<Vec<ConnectCall>>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(VecDeque::new()),
            links: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Queues a link for the next `connect()`.
    pub async fn push_link(&self, link: Arc<MockLink>) {
        self.queue.lock().await.push_back(Ok(link));
    }

    /// Queues a connection failure for the next `connect()`.
    pub async fn push_failure(&self, message: impl Into<String>) {
        self.queue.lock().await.push_back(Err(message.into()));
    }

    pub async fn connect_calls(&self) -> Vec<ConnectCall> {
        self.calls.lock().await.clone()
    }

    /// Every link handed out so far, in order.
    pub async fn links(&self) -> Vec<Arc<MockLink>> {
        self.links.lock().await.clone()
    }

    /// Polls until at least `count` connects happened or `timeout` elapses.
    pub async fn wait_for_connects(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.calls.lock().await.len() >= count {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl SessionConnector for MockConnector {
    async fn connect(
        &self,
        account: &Account,
        credentials: Option<String>,
    ) -> Result<Box<dyn SessionLink>, BridgeError> {
        self.calls.lock().await.push(ConnectCall {
            account_id: account.id.clone(),
            credentials,
        });
        let next = self.queue.lock().await.pop_front();
        let link = match next {
            Some(Ok(link)) => link,
            Some(Err(message)) => return Err(BridgeError::transient(message)),
            None => MockLink::new(),
        };
        self.links.lock().await.push(Arc::clone(&link));
        Ok(Box::new(SharedLink(link)))
    }
}
