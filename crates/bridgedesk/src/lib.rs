// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process wiring for the `bridgedesk` binary.

pub mod pipeline;
pub mod serve;
pub mod shutdown;
pub mod transport;

pub use pipeline::{Pipeline, sync_accounts};
pub use transport::UnlinkedConnector;
