// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook HTTP receiver for Bridgedesk.
//!
//! Platforms deliver business-API events over HTTP. The gateway answers the
//! subscription handshake, checks body signatures against the secret of
//! the account a body is addressed to, and queues accepted bodies for the ingest worker. It
//! never processes a body inline.

pub mod handlers;
pub mod server;

pub use server::{GatewayState, router, start_server};
