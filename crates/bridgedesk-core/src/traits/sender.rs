// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound sending seams.

use async_trait::async_trait;

use crate::error::BridgeError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Account, AccountKind, OutboundContent, SendRequest, SendResult};

/// Delivers one message through one kind of platform account.
///
/// Implementations exist for the REST-based accounts (cloud API, page API)
/// and for paired sessions, where the send is routed through the live
/// connection owned by the connection manager.
#[async_trait]
pub trait PlatformSender: PluginAdapter {
    /// The account kind this sender serves.
    fn kind(&self) -> AccountKind;

    /// Sends `content` to `recipient` using `account`'s credentials.
    ///
    /// Returns the platform-assigned message id.
    async fn send(
        &self,
        account: &Account,
        recipient: &str,
        content: &OutboundContent,
    ) -> Result<String, BridgeError>;

    /// Checks that `account`'s credentials are usable and returns the
    /// remote identity they resolve to (display name, phone number, page name).
    async fn validate(&self, account: &Account) -> Result<String, BridgeError>;
}

/// Capability to send a logical message, injected into the automation engine.
///
/// Failures are reported in the returned [`SendResult`], never as errors.
#[async_trait]
pub trait OutboundSender: Send + Sync + 'static {
    async fn send(&self, request: SendRequest) -> SendResult;
}
