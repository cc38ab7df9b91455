// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound dispatch for Bridgedesk.
//!
//! The [`Dispatcher`] turns a logical [`SendRequest`](bridgedesk_core::types::SendRequest)
//! into one platform call through the active account for the target's
//! platform, then records the outbound message. REST senders for the
//! business cloud API and the page messaging API live here; the
//! paired-session sender is supplied by the connection manager.

pub mod address;
pub mod cloud;
pub mod dispatcher;
pub mod graph;
pub mod page;
pub mod webhook;

pub use address::normalize_address;
pub use cloud::CloudApiSender;
pub use dispatcher::Dispatcher;
pub use graph::GraphClient;
pub use page::PageApiSender;
pub use webhook::WebhookCaller;
