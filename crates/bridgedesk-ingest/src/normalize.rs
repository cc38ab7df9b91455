// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook payload normalization.
//!
//! Cloud-API bodies nest messages under `entry[].changes[].value`; page-API
//! bodies (Messenger and Instagram) list events under `entry[].messaging[]`.
//! Both reduce to canonical [`InboundEvent`]s and [`DeliveryUpdate`]s.
//! Entries that do not carry a usable sender or id are skipped.

use serde_json::Value;
use tracing::debug;

use bridgedesk_core::types::{
    AccountKind, DeliveryState, DeliveryUpdate, InboundEvent, MessageType, TIMESTAMP_FORMAT,
};

/// Canonical content of one webhook body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    pub events: Vec<InboundEvent>,
    pub statuses: Vec<DeliveryUpdate>,
}

impl Normalized {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.statuses.is_empty()
    }
}

/// Normalizes a webhook body produced for an account of `kind`.
pub fn normalize(kind: AccountKind, payload: &Value) -> Normalized {
    match kind {
        AccountKind::CloudApi => cloud_api(payload),
        AccountKind::PageApi => page_api(payload),
        AccountKind::PairedSession => {
            debug!("paired-session items arrive normalized; raw body ignored");
            Normalized::default()
        }
    }
}

fn array<'a>(value: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Converts a unix timestamp (seconds, or milliseconds when `millis`) into
/// the persisted timestamp format.
fn unix_timestamp(value: &Value, millis: bool) -> Option<String> {
    let raw = match value {
        Value::String(s) => s.parse::<i64>().ok()?,
        Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    let dt = if millis {
        chrono::DateTime::from_timestamp_millis(raw)?
    } else {
        chrono::DateTime::from_timestamp(raw, 0)?
    };
    Some(dt.format(TIMESTAMP_FORMAT).to_string())
}

// --- Cloud API ---

fn cloud_api(payload: &Value) -> Normalized {
    let mut out = Normalized::default();
    for entry in array(payload, "entry") {
        for change in array(entry, "changes") {
            let Some(value) = change.get("value") else {
                continue;
            };
            let names: Vec<(&str, &str)> = array(value, "contacts")
                .filter_map(|c| Some((str_at(c, "/wa_id")?, str_at(c, "/profile/name")?)))
                .collect();

            for message in array(value, "messages") {
                match cloud_message(message, &names) {
                    Some(event) => out.events.push(event),
                    None => debug!("cloud-api message without sender skipped"),
                }
            }
            for status in array(value, "statuses") {
                if let Some(update) = cloud_status(status) {
                    out.statuses.push(update);
                }
            }
        }
    }
    out
}

fn cloud_message(message: &Value, names: &[(&str, &str)]) -> Option<InboundEvent> {
    let from = str_at(message, "/from")?;
    let kind = str_at(message, "/type").unwrap_or("text");

    let (message_type, content, media_url) = match kind {
        "text" => (
            MessageType::Text,
            str_at(message, "/text/body").unwrap_or_default().to_string(),
            None,
        ),
        "image" | "video" | "document" | "audio" | "sticker" => {
            let media = message.get(kind);
            let caption = media
                .and_then(|m| str_at(m, "/caption"))
                .unwrap_or_default();
            let link = media.and_then(|m| str_at(m, "/link")).map(str::to_string);
            (MessageType::from_platform(kind), caption.to_string(), link)
        }
        "location" => {
            let lat = message.pointer("/location/latitude").and_then(Value::as_f64);
            let lon = message.pointer("/location/longitude").and_then(Value::as_f64);
            let content = match (lat, lon) {
                (Some(lat), Some(lon)) => format!("{lat},{lon}"),
                _ => String::new(),
            };
            (MessageType::Location, content, None)
        }
        "button" => (
            MessageType::Text,
            str_at(message, "/button/text").unwrap_or_default().to_string(),
            None,
        ),
        "interactive" => {
            let title = str_at(message, "/interactive/button_reply/title")
                .or_else(|| str_at(message, "/interactive/list_reply/title"))
                .unwrap_or_default();
            (MessageType::Text, title.to_string(), None)
        }
        _ => (MessageType::Other, String::new(), None),
    };

    Some(InboundEvent {
        external_sender_id: from.to_string(),
        sender_name: names
            .iter()
            .find(|(id, _)| *id == from)
            .map(|(_, name)| (*name).to_string()),
        content,
        message_type,
        media_url,
        external_message_id: str_at(message, "/id").map(str::to_string),
        timestamp: message
            .get("timestamp")
            .and_then(|t| unix_timestamp(t, false)),
    })
}

fn cloud_status(status: &Value) -> Option<DeliveryUpdate> {
    let id = str_at(status, "/id")?;
    let state: DeliveryState = str_at(status, "/status")?.parse().ok()?;
    Some(DeliveryUpdate {
        external_message_id: id.to_string(),
        state,
    })
}

// --- Page API ---

fn page_api(payload: &Value) -> Normalized {
    let mut out = Normalized::default();
    for entry in array(payload, "entry") {
        for item in array(entry, "messaging") {
            if let Some(message) = item.get("message") {
                if message.get("is_echo").and_then(Value::as_bool) == Some(true) {
                    debug!("page-api echo ignored");
                    continue;
                }
                match page_message(item, message) {
                    Some(event) => out.events.push(event),
                    None => debug!("page-api message without sender skipped"),
                }
            }
            if let Some(delivery) = item.get("delivery") {
                for mid in array(delivery, "mids").filter_map(Value::as_str) {
                    out.statuses.push(DeliveryUpdate {
                        external_message_id: mid.to_string(),
                        state: DeliveryState::Delivered,
                    });
                }
            }
            // Messenger read receipts carry only a watermark; Instagram names the message.
            if let Some(mid) = str_at(item, "/read/mid") {
                out.statuses.push(DeliveryUpdate {
                    external_message_id: mid.to_string(),
                    state: DeliveryState::Read,
                });
            }
        }
    }
    out
}

fn page_message(item: &Value, message: &Value) -> Option<InboundEvent> {
    let sender = str_at(item, "/sender/id")?;
    let text = str_at(message, "/text").unwrap_or_default();

    let attachment = array(message, "attachments").next();
    let (message_type, media_url) = match attachment {
        Some(att) => {
            let message_type = match str_at(att, "/type").unwrap_or_default() {
                "image" => MessageType::Image,
                "video" => MessageType::Video,
                "audio" => MessageType::Audio,
                "file" => MessageType::Document,
                "location" => MessageType::Location,
                _ => MessageType::Other,
            };
            (message_type, str_at(att, "/payload/url").map(str::to_string))
        }
        None => (MessageType::Text, None),
    };

    Some(InboundEvent {
        external_sender_id: sender.to_string(),
        sender_name: None,
        content: text.to_string(),
        message_type,
        media_url,
        external_message_id: str_at(message, "/mid").map(str::to_string),
        timestamp: item.get("timestamp").and_then(|t| unix_timestamp(t, true)),
    })
}
