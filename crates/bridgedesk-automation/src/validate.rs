// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Write-time rule validation.

use bridgedesk_core::BridgeError;
use bridgedesk_core::types::{ActionKind, ConversationState, NewRule, TriggerKind};

use crate::triggers::{parse_keywords, parse_minutes, parse_window};

/// Rejects a rule whose name or parameters could never work.
pub fn validate_rule(rule: &NewRule) -> Result<(), BridgeError> {
    if rule.name.trim().is_empty() {
        return Err(BridgeError::Validation("rule name must not be empty".into()));
    }

    match rule.trigger {
        TriggerKind::MessageReceived | TriggerKind::NewConversation => {}
        TriggerKind::Keyword => {
            parse_keywords(&rule.trigger_param)?;
        }
        TriggerKind::ResponseTime => {
            parse_minutes(&rule.trigger_param)?;
        }
        TriggerKind::ScheduleWindow => {
            let (start, end) = parse_window(&rule.trigger_param)?;
            if start > end {
                return Err(BridgeError::Validation(format!(
                    "schedule_window {start:02}-{end:02} crosses midnight; split it into two rules"
                )));
            }
        }
    }

    let param = rule.action_param.trim();
    match rule.action {
        ActionKind::SendMessage if param.is_empty() => Err(BridgeError::Validation(
            "send_message needs a message template".into(),
        )),
        ActionKind::AssignAgent if param.is_empty() => Err(BridgeError::Validation(
            "assign_agent needs an agent id".into(),
        )),
        ActionKind::Tag if param.is_empty() => {
            Err(BridgeError::Validation("tag needs a tag name".into()))
        }
        ActionKind::ChangeStatus => param
            .parse::<ConversationState>()
            .map(|_| ())
            .map_err(|_| {
                BridgeError::Validation(format!(
                    "change_status target must be open, in_progress or closed, got {param:?}"
                ))
            }),
        ActionKind::CallWebhook if !is_http_url(param) => Err(BridgeError::Validation(format!(
            "call_webhook needs an http(s) URL, got {param:?}"
        ))),
        _ => Ok(()),
    }
}

pub(crate) fn is_http_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    rest.is_some_and(|host| !host.is_empty())
}
