// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trigger predicates.
//!
//! Every predicate is a pure function of the rule parameter and a
//! [`TriggerContext`]. A malformed parameter is an error, which the engine
//! treats as "does not match".

use chrono::{DateTime, FixedOffset, TimeDelta, Timelike, Utc};

use bridgedesk_core::BridgeError;
use bridgedesk_core::types::TriggerKind;

/// Threshold used by `response_time` when the rule leaves it blank.
pub const DEFAULT_RESPONSE_MINUTES: i64 = 30;

/// Largest accepted `response_time` threshold: one year.
pub const MAX_RESPONSE_MINUTES: i64 = 525_600;

/// Facts a trigger is evaluated against.
#[derive(Debug, Clone)]
pub struct TriggerContext<'a> {
    /// Content of the inbound message.
    pub content: &'a str,
    /// Conversation message count captured at ingestion.
    pub message_count: i64,
    /// Most recent outbound message in the conversation.
    pub last_outbound_at: Option<DateTime<Utc>>,
    /// Evaluation time in the operator's local offset.
    pub now: DateTime<FixedOffset>,
}

pub fn evaluate(
    trigger: TriggerKind,
    param: &str,
    ctx: &TriggerContext<'_>,
) -> Result<bool, BridgeError> {
    match trigger {
        TriggerKind::MessageReceived => Ok(true),
        TriggerKind::NewConversation => Ok(ctx.message_count <= 1),
        TriggerKind::Keyword => keyword_matches(param, ctx.content),
        TriggerKind::ResponseTime => {
            let minutes = parse_minutes(param)?;
            Ok(response_overdue(
                minutes,
                ctx.last_outbound_at,
                ctx.now.with_timezone(&Utc),
            ))
        }
        TriggerKind::ScheduleWindow => {
            let (start, end) = parse_window(param)?;
            Ok(in_window(start, end, ctx.now.hour()))
        }
    }
}

/// Lower-cased, trimmed keywords from a comma-separated list.
pub fn parse_keywords(param: &str) -> Result<Vec<String>, BridgeError> {
    let keywords: Vec<String> = param
        .split(',')
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    if keywords.is_empty() {
        return Err(BridgeError::Validation(
            "keyword trigger needs at least one keyword".into(),
        ));
    }
    Ok(keywords)
}

/// Case-insensitive substring match against any keyword.
pub fn keyword_matches(param: &str, content: &str) -> Result<bool, BridgeError> {
    let content = content.to_lowercase();
    Ok(parse_keywords(param)?
        .iter()
        .any(|k| content.contains(k.as_str())))
}

/// Minutes for `response_time`; blank means [`DEFAULT_RESPONSE_MINUTES`].
///
/// Accepts 1..=[`MAX_RESPONSE_MINUTES`].
pub fn parse_minutes(param: &str) -> Result<i64, BridgeError> {
    let param = param.trim();
    if param.is_empty() {
        return Ok(DEFAULT_RESPONSE_MINUTES);
    }
    match param.parse::<i64>() {
        Ok(minutes) if (1..=MAX_RESPONSE_MINUTES).contains(&minutes) => Ok(minutes),
        _ => Err(BridgeError::Validation(format!(
            "response_time needs between 1 and {MAX_RESPONSE_MINUTES} minutes, got {param:?}"
        ))),
    }
}

/// True when nothing was sent yet, or the last send is older than `minutes`.
///
/// A threshold too large to represent is never exceeded.
pub fn response_overdue(
    minutes: i64,
    last_outbound_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    let Some(last) = last_outbound_at else {
        return true;
    };
    match TimeDelta::try_minutes(minutes) {
        Some(threshold) => now.signed_duration_since(last) > threshold,
        None => false,
    }
}

/// Parses `"HH-HH"` into two hours in 0..=23.
pub fn parse_window(param: &str) -> Result<(u32, u32), BridgeError> {
    let invalid = || {
        BridgeError::Validation(format!(
            "schedule_window must look like \"09-18\", got {param:?}"
        ))
    };
    let (start, end) = param.trim().split_once('-').ok_or_else(invalid)?;
    let hour = |s: &str| {
        s.trim()
            .parse::<u32>()
            .ok()
            .filter(|h| *h <= 23)
            .ok_or_else(invalid)
    };
    Ok((hour(start)?, hour(end)?))
}

/// Inclusive numeric comparison. A window whose start is after its end
/// never matches.
pub fn in_window(start: u32, end: u32, hour: u32) -> bool {
    start <= hour && hour <= end
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<FixedOffset> {
        FixedOffset::west_opt(6 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 3, 9, hour, 15, 0)
            .unwrap()
    }

    fn ctx(content: &str) -> TriggerContext<'_> {
        TriggerContext {
            content,
            message_count: 3,
            last_outbound_at: None,
            now: at(10),
        }
    }

    #[test]
    fn message_received_always_matches() {
        assert!(evaluate(TriggerKind::MessageReceived, "", &ctx("x")).unwrap());
    }

    #[test]
    fn new_conversation_only_for_first_message() {
        let mut c = ctx("hola");
        c.message_count = 1;
        assert!(evaluate(TriggerKind::NewConversation, "", &c).unwrap());
        c.message_count = 2;
        assert!(!evaluate(TriggerKind::NewConversation, "", &c).unwrap());
    }

    #[test]
    fn keyword_is_case_insensitive_substring() {
        assert!(keyword_matches("precio, costo", "¿Cuál es el PRECIO?").unwrap());
        assert!(keyword_matches("HOLA", "holanda").unwrap());
        assert!(!keyword_matches("precio,costo", "gracias").unwrap());
        assert!(keyword_matches(" , envío ,", "costo de ENVÍO").unwrap());
    }

    #[test]
    fn empty_keyword_list_is_malformed() {
        assert!(keyword_matches(" , ,", "anything").is_err());
        assert!(evaluate(TriggerKind::Keyword, "", &ctx("hola")).is_err());
    }

    #[test]
    fn response_time_thresholds() {
        let now = at(12).with_timezone(&Utc);
        assert!(response_overdue(30, None, now));
        assert!(response_overdue(
            30,
            Some(now - chrono::Duration::minutes(31)),
            now
        ));
        assert!(!response_overdue(
            30,
            Some(now - chrono::Duration::minutes(30)),
            now
        ));
        assert!(!response_overdue(
            30,
            Some(now - chrono::Duration::minutes(5)),
            now
        ));
    }

    #[test]
    fn response_time_defaults_and_rejects_bad_minutes() {
        assert_eq!(parse_minutes("").unwrap(), 30);
        assert_eq!(parse_minutes(" 45 ").unwrap(), 45);
        assert!(parse_minutes("0").is_err());
        assert!(parse_minutes("-5").is_err());
        assert!(parse_minutes("media hora").is_err());
    }

    #[test]
    fn response_time_uses_context_clock() {
        let mut c = ctx("hola");
        c.last_outbound_at = Some(c.now.with_timezone(&Utc) - chrono::Duration::minutes(90));
        assert!(evaluate(TriggerKind::ResponseTime, "60", &c).unwrap());
        assert!(!evaluate(TriggerKind::ResponseTime, "120", &c).unwrap());
    }

    #[test]
    fn schedule_window_bounds_are_inclusive() {
        let matches = |hour| {
            let c = TriggerContext {
                now: at(hour),
                ..ctx("")
            };
            evaluate(TriggerKind::ScheduleWindow, "09-18", &c).unwrap()
        };
        assert!(matches(9));
        assert!(matches(18));
        assert!(!matches(19));
        assert!(!matches(8));
    }

    #[test]
    fn schedule_window_uses_local_hour() {
        // 10:15 at UTC-6 is 16:15 UTC.
        let c = ctx("");
        assert!(evaluate(TriggerKind::ScheduleWindow, "10-10", &c).unwrap());
        assert!(!evaluate(TriggerKind::ScheduleWindow, "16-16", &c).unwrap());
    }

    #[test]
    fn response_time_threshold_is_bounded() {
        assert_eq!(parse_minutes("525600").unwrap(), MAX_RESPONSE_MINUTES);
        for param in ["525601", "200000000000000", "9223372036854775807"] {
            assert!(parse_minutes(param).is_err(), "{param}");
        }
    }

    #[test]
    fn unrepresentable_threshold_is_never_overdue() {
        let now = Utc::now();
        let last = Some(now - TimeDelta::days(3650));
        assert!(!response_overdue(200_000_000_000_000, last, now));
        assert!(!response_overdue(i64::MAX, last, now));
        assert!(response_overdue(i64::MAX, None, now));
    }

    #[test]
    fn window_across_midnight_never_matches() {
        for hour in 0..24 {
            assert!(!in_window(22, 6, hour));
        }
    }

    #[test]
    fn malformed_windows() {
        for param in ["", "9", "09-24", "a-b", "09:00-18:00"] {
            assert!(parse_window(param).is_err(), "{param}");
        }
        assert_eq!(parse_window(" 0-23 ").unwrap(), (0, 23));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn keyword_match_ignores_case(word in "[a-z]{1,8}", prefix in "[a-z ]{0,8}", upper in any::<bool>()) {
                let keyword = if upper { word.to_uppercase() } else { word.clone() };
                let content = format!("{prefix}{}", word.to_uppercase());
                prop_assert!(keyword_matches(&keyword, &content).unwrap());
            }

            #[test]
            fn valid_windows_parse_back(start in 0u32..24, end in 0u32..24) {
                let param = format!("{start:02}-{end:02}");
                prop_assert_eq!(parse_window(&param).unwrap(), (start, end));
            }
        }
    }
}
