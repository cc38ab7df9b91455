// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message templates for the `send_message` action.
//!
//! Supported placeholders: `{nombre}` / `{name}` (contact display name),
//! `{fecha}` / `{date}` (`dd/mm/YYYY`) and `{hora}` / `{time}` (`HH:MM`).
//! Anything else in braces is left untouched.

use chrono::{DateTime, FixedOffset};

use bridgedesk_core::types::Contact;

/// Fills placeholders in one left-to-right pass; substituted text is never
/// scanned again.
pub fn render_template(template: &str, contact: &Contact, now: DateTime<FixedOffset>) -> String {
    let date = now.format("%d/%m/%Y").to_string();
    let time = now.format("%H:%M").to_string();
    let value = |name: &str| match name {
        "nombre" | "name" => Some(contact.name.as_str()),
        "fecha" | "date" => Some(date.as_str()),
        "hora" | "time" => Some(time.as_str()),
        _ => None,
    };

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let filled = tail
            .find('}')
            .and_then(|close| value(&tail[1..close]).map(|text| (text, close)));
        match filled {
            Some((text, close)) => {
                out.push_str(text);
                rest = &tail[close + 1..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
