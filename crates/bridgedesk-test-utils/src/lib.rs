// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Bridgedesk integration tests.
//!
//! Provides mock adapters and a temp-SQLite harness for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockConnector`] / [`MockLink`] - scripted paired sessions
//! - [`RecordingSender`] - platform sender that captures sends
//! - [`RecordingOutbound`] - outbound capability that captures requests
//! - [`TestStorage`] - initialized SQLite storage in a temp directory

pub mod harness;
pub mod mock_sender;
pub mod mock_session;

pub use harness::TestStorage;
pub use mock_sender::{RecordingOutbound, RecordingSender, SentMessage};
pub use mock_session::{MockConnector, MockLink};
