// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection lifecycle management for Bridgedesk accounts.
//!
//! Paired-session accounts get one long-lived actor each, tracked in a
//! [`SessionRegistry`]. The actor drives pairing, persists credentials,
//! forwards inbound events to the ingest queue and reconnects after
//! transient failures. Token-based accounts have no live connection; their
//! `start` is a credential check through the platform sender.

pub mod manager;
pub mod pairing;
pub mod registry;
pub mod sender;

mod actor;
mod forwarder;

pub use manager::{ConnectionManager, StartResult};
pub use pairing::render_pairing;
pub use registry::SessionRegistry;
pub use sender::SessionSender;
