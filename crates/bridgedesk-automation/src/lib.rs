// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Automation engine for Bridgedesk.
//!
//! Active rules for a message's platform are evaluated in priority order.
//! The first rule whose trigger holds has its action executed, and exactly
//! one execution row records the outcome. Trigger predicates are pure
//! functions of the ingestion snapshot and the supplied clock.

pub mod actions;
pub mod engine;
pub mod template;
pub mod triggers;
pub mod validate;
pub mod worker;

pub use actions::{ActionError, ActionRunner, webhook_payload};
pub use engine::{AutomationEngine, Clock, local_clock};
pub use template::render_template;
pub use triggers::{TriggerContext, evaluate};
pub use validate::validate_rule;
pub use worker::AutomationWorker;
