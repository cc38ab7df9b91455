// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for storage entities. Each takes `&Database` and runs its
//! statements on the single writer thread.

pub mod accounts;
pub mod contacts;
pub mod conversations;
pub mod executions;
pub mod messages;
pub mod rules;
pub mod webhook_log;
