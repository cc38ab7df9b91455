// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-account session actor.
//!
//! States: disconnected -> connecting -> {qr_pending | connected}.
//! A setup failure moves to `error`, a transient disconnect back to
//! `connecting`; both retry after the reconnect delay. A logout is terminal:
//! credentials are purged and the account leaves the active slot.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use bridgedesk_core::types::{
    Account, AccountKind, ConnectionState, EventSource, IngestItem, OutboundContent,
    PairingChallenge, SessionStatus, now_timestamp,
};
use bridgedesk_core::{
    BridgeError, DisconnectReason, SessionConnector, SessionEvent, SessionLink, StorageAdapter,
};

use crate::forwarder::Forwarder;
use crate::pairing::render_pairing;

/// Messages accepted by a running actor.
pub(crate) enum Command {
    Send {
        recipient: String,
        content: OutboundContent,
        reply: oneshot::Sender<Result<String, BridgeError>>,
    },
    Stop,
}

/// How one connection attempt ended.
enum Outcome {
    Stopped,
    LoggedOut,
    Retry(String),
}

pub(crate) struct SessionActor {
    pub(crate) account: Account,
    pub(crate) connector: Arc<dyn SessionConnector>,
    pub(crate) storage: Arc<dyn StorageAdapter>,
    pub(crate) forwarder: Forwarder,
    pub(crate) commands: mpsc::Receiver<Command>,
    pub(crate) status: watch::Sender<SessionStatus>,
    pub(crate) reconnect_delay: Duration,
}

impl SessionActor {
    pub(crate) async fn run(mut self) {
        info!(account_id = %self.account.id, "session actor started");
        loop {
            match self.connect_once().await {
                Outcome::Stopped => {
                    self.publish(ConnectionState::Disconnected, None, None)
                        .await;
                    break;
                }
                Outcome::LoggedOut => {
                    self.handle_logout().await;
                    break;
                }
                Outcome::Retry(reason) => {
                    debug!(
                        account_id = %self.account.id,
                        reason = %reason,
                        delay_ms = self.reconnect_delay.as_millis() as u64,
                        "scheduling reconnect"
                    );
                    if !self.wait_before_retry().await {
                        self.publish(ConnectionState::Disconnected, None, None)
                            .await;
                        break;
                    }
                }
            }
        }
        let account_id = self.account.id.clone();
        self.forwarder.flush().await;
        info!(account_id = %account_id, "session actor stopped");
    }

    async fn connect_once(&mut self) -> Outcome {
        self.publish(ConnectionState::Connecting, None, None).await;

        let credentials = match self.storage.load_credentials(&self.account.id).await {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!(account_id = %self.account.id, error = %e, "failed to load credentials");
                None
            }
        };

        // The connect future must not borrow `self`: `drive` takes it mutably.
        let connector = Arc::clone(&self.connector);
        let account = self.account.clone();
        let link: Arc<dyn SessionLink> = {
            let connect = connector.connect(&account, credentials);
            tokio::pin!(connect);
            loop {
                tokio::select! {
                    result = &mut connect => match result {
                        Ok(link) => break Arc::from(link),
                        Err(e) => {
                            warn!(account_id = %account.id, error = %e, "session setup failed");
                            let message = e.to_string();
                            self.publish(ConnectionState::Error, None, Some(message.clone()))
                                .await;
                            return Outcome::Retry(message);
                        }
                    },
                    command = self.commands.recv() => match command {
                        None | Some(Command::Stop) => return Outcome::Stopped,
                        Some(Command::Send { reply, .. }) => {
                            let _ = reply.send(Err(BridgeError::transient("session is connecting")));
                        }
                    },
                }
            }
        };

        let outcome = self.drive(&link).await;
        link.close().await;
        outcome
    }

    /// Runs the event loop of one established link.
    async fn drive(&mut self, link: &Arc<dyn SessionLink>) -> Outcome {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    None | Some(Command::Stop) => return Outcome::Stopped,
                    Some(Command::Send { recipient, content, reply }) => {
                        self.spawn_send(link, recipient, content, reply);
                    }
                },
                event = link.next_event() => match event {
                    None => {
                        self.publish(
                            ConnectionState::Connecting,
                            None,
                            Some("transport closed".to_string()),
                        )
                        .await;
                        return Outcome::Retry("transport closed".into());
                    }
                    Some(event) => {
                        if let Some(outcome) = self.handle_event(event).await {
                            return outcome;
                        }
                    }
                },
            }
        }
    }

    fn spawn_send(
        &self,
        link: &Arc<dyn SessionLink>,
        recipient: String,
        content: OutboundContent,
        reply: oneshot::Sender<Result<String, BridgeError>>,
    ) {
        if self.status.borrow().state != ConnectionState::Connected {
            let _ = reply.send(Err(BridgeError::transient(
                "paired session is not connected",
            )));
            return;
        }
        // Sends run beside the event loop so a slow send never stalls reads.
        let link = Arc::clone(link);
        tokio::spawn(async move {
            let result = link.send(&recipient, &content).await;
            let _ = reply.send(result);
        });
    }

    async fn handle_event(&mut self, event: SessionEvent) -> Option<Outcome> {
        let account_id = self.account.id.clone();
        match event {
            SessionEvent::PairingCode(code) => {
                let challenge = render_pairing(&code).unwrap_or_else(|e| {
                    warn!(account_id = %account_id, error = %e, "pairing code not renderable");
                    PairingChallenge {
                        code: code.clone(),
                        rendered: String::new(),
                    }
                });
                info!(account_id = %account_id, "pairing code issued, waiting for scan");
                if let Err(e) = self.storage.set_pairing_code(&account_id, Some(&code)).await {
                    warn!(account_id = %account_id, error = %e, "failed to persist pairing code");
                }
                self.mirror(ConnectionState::QrPending, None, None).await;
                self.status.send_modify(|status| {
                    status.state = ConnectionState::QrPending;
                    status.pairing = Some(challenge);
                    status.last_error = None;
                    status.updated_at = now_timestamp();
                });
                None
            }
            SessionEvent::Connected { identity } => {
                info!(account_id = %account_id, identity = %identity, "session connected");
                if let Err(e) = self.storage.set_pairing_code(&account_id, None).await {
                    warn!(account_id = %account_id, error = %e, "failed to clear pairing code");
                }
                self.publish(ConnectionState::Connected, Some(identity), None)
                    .await;
                None
            }
            SessionEvent::CredentialsUpdated(blob) => {
                if let Err(e) = self.storage.save_credentials(&account_id, &blob).await {
                    warn!(account_id = %account_id, error = %e, "failed to persist credentials");
                    self.status.send_modify(|status| {
                        status.last_error = Some(format!("credential persistence failed: {e}"));
                        status.updated_at = now_timestamp();
                    });
                }
                None
            }
            SessionEvent::Message(event) => {
                self.forward(IngestItem::Event {
                    source: self.source(),
                    event,
                });
                None
            }
            SessionEvent::Status(update) => {
                self.forward(IngestItem::Status {
                    source: self.source(),
                    update,
                });
                None
            }
            SessionEvent::Disconnected(DisconnectReason::LoggedOut) => {
                warn!(account_id = %account_id, "session logged out remotely");
                Some(Outcome::LoggedOut)
            }
            SessionEvent::Disconnected(DisconnectReason::Transient(reason)) => {
                warn!(account_id = %account_id, reason = %reason, "session dropped");
                self.publish(ConnectionState::Connecting, None, Some(reason.clone()))
                    .await;
                Some(Outcome::Retry(reason))
            }
        }
    }

    fn source(&self) -> EventSource {
        EventSource {
            platform: self.account.platform,
            kind: AccountKind::PairedSession,
            account_id: Some(self.account.id.clone()),
        }
    }

    /// Hands an item towards the ingest queue without waiting on it.
    fn forward(&self, item: IngestItem) {
        self.forwarder.push(item);
    }

    /// Sleeps for the reconnect delay. Returns `false` if stopped meanwhile.
    async fn wait_before_retry(&mut self) -> bool {
        let sleep = tokio::time::sleep(self.reconnect_delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                command = self.commands.recv() => match command {
                    None | Some(Command::Stop) => return false,
                    Some(Command::Send { reply, .. }) => {
                        let _ = reply.send(Err(BridgeError::transient("session is reconnecting")));
                    }
                },
            }
        }
    }

    async fn handle_logout(&mut self) {
        let id = self.account.id.clone();
        if let Err(e) = self.storage.purge_credentials(&id).await {
            warn!(account_id = %id, error = %e, "failed to purge credentials");
        }
        match self.storage.clear_active_if(self.account.platform, &id).await {
            Ok(true) => info!(account_id = %id, "logged-out account removed from active slot"),
            Ok(false) => {}
            Err(e) => warn!(account_id = %id, error = %e, "failed to clear active slot"),
        }
        self.status.send_modify(|status| {
            status.remote_identity = None;
        });
        self.publish(
            ConnectionState::Disconnected,
            None,
            Some("logged out; re-pairing required".to_string()),
        )
        .await;
    }

    /// Mirrors a new state into the account row, then publishes it to watchers.
    ///
    /// Watchers woken by the publish always find the row already updated.
    async fn publish(
        &self,
        state: ConnectionState,
        identity: Option<String>,
        error: Option<String>,
    ) {
        self.mirror(state, identity.as_deref(), error.as_deref())
            .await;
        self.status.send_modify(|status| {
            status.state = state;
            if identity.is_some() {
                status.remote_identity = identity.clone();
            }
            status.last_error = error.clone();
            if state != ConnectionState::QrPending {
                status.pairing = None;
            }
            status.updated_at = now_timestamp();
        });
    }

    async fn mirror(&self, state: ConnectionState, identity: Option<&str>, error: Option<&str>) {
        if let Err(e) = self
            .storage
            .update_connection(&self.account.id, state, identity, error)
            .await
        {
            warn!(account_id = %self.account.id, error = %e, "failed to mirror connection state");
        }
    }
}
