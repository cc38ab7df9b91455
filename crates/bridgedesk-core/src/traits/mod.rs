// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! All traits use `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod sender;
pub mod session;
pub mod storage;

pub use adapter::PluginAdapter;
pub use sender::{OutboundSender, PlatformSender};
pub use session::{DisconnectReason, SessionConnector, SessionEvent, SessionLink};
pub use storage::StorageAdapter;
