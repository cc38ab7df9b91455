// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Paired-session transport seam.
//!
//! The personal-account wire protocol lives behind these traits. The
//! connection manager polls [`SessionLink::next_event`] from one task while
//! sends run concurrently from others, so all methods take `&self`.

use async_trait::async_trait;

use crate::error::BridgeError;
use crate::types::{Account, DeliveryUpdate, InboundEvent, OutboundContent};

/// Why a live session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The remote side revoked the pairing. Terminal; requires re-pairing.
    LoggedOut,
    /// Network or protocol failure. The session may be re-established.
    Transient(String),
}

/// Events surfaced by a paired session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A pairing code the operator must scan.
    PairingCode(String),
    /// The session is authenticated as `identity`.
    Connected { identity: String },
    /// Fresh credential material that must be persisted.
    CredentialsUpdated(String),
    /// An inbound message.
    Message(InboundEvent),
    /// A delivery report for a message we sent.
    Status(DeliveryUpdate),
    /// The session ended.
    Disconnected(DisconnectReason),
}

/// Opens paired sessions.
#[async_trait]
pub trait SessionConnector: Send + Sync + 'static {
    /// Opens a session for `account`, resuming from `credentials` when present.
    async fn connect(
        &self,
        account: &Account,
        credentials: Option<String>,
    ) -> Result<Box<dyn SessionLink>, BridgeError>;
}

/// One live paired session.
#[async_trait]
pub trait SessionLink: Send + Sync {
    /// Next event from the session. `None` means the transport closed
    /// without a reason, which is treated as a transient disconnect.
    ///
    /// Must be cancel-safe: the caller polls it inside `select!`.
    async fn next_event(&self) -> Option<SessionEvent>;

    /// Sends a message and returns the platform message id.
    async fn send(&self, recipient: &str, content: &OutboundContent)
    -> Result<String, BridgeError>;

    /// Closes the session without logging out.
    async fn close(&self);
}
