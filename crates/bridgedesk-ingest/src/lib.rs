// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound pipeline for Bridgedesk.
//!
//! Every inbound item is appended to the webhook audit log before anything
//! else happens. Raw webhook bodies are normalized into canonical events,
//! each event is persisted in one storage transaction, and stored messages
//! are handed to the bounded automation queue in arrival order.

pub mod ingestor;
pub mod normalize;
pub mod signature;
pub mod worker;

pub use ingestor::{IngestReport, Ingestor, SessionPayload};
pub use normalize::{Normalized, normalize};
pub use signature::{SIGNATURE_HEADER, verify_signature};
pub use worker::IngestWorker;
