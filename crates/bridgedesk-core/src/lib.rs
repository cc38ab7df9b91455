// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Bridgedesk.
//!
//! This crate provides the error taxonomy, the domain types, and the adapter
//! traits that the storage, dispatch, connection, ingest and automation
//! crates implement or consume.

pub mod auth;
pub mod error;
pub mod traits;
pub mod types;

pub use auth::{Permission, Principal, Role, authorize};
pub use error::BridgeError;
pub use types::{AdapterType, HealthStatus, now_timestamp, parse_timestamp};

pub use traits::{
    DisconnectReason, OutboundSender, PlatformSender, PluginAdapter, SessionConnector,
    SessionEvent, SessionLink, StorageAdapter,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;

    #[test]
    fn adapter_type_roundtrips_through_strings() {
        use std::str::FromStr;

        for variant in [AdapterType::Storage, AdapterType::Sender, AdapterType::Session] {
            let s = variant.to_string();
            let parsed = AdapterType::from_str(&s).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn send_result_failure_carries_error_kind() {
        let err = BridgeError::Configuration("no active account for whatsapp".into());
        let result = SendResult::failure(Some(Platform::Whatsapp), &err);
        assert!(!result.success);
        assert_eq!(result.error_kind.as_deref(), Some("configuration"));
        assert!(result.error.unwrap().contains("no active account"));
    }

    #[test]
    fn placeholder_names() {
        assert_eq!(
            placeholder_contact_name(Platform::Whatsapp, "5215512345678"),
            "+5215512345678"
        );
        assert_eq!(
            placeholder_contact_name(Platform::Instagram, "1789"),
            "instagram user 1789"
        );
    }

    #[test]
    fn trait_objects_are_constructible() {
        fn _assert_object_safe(
            _: Option<&dyn StorageAdapter>,
            _: Option<&dyn PlatformSender>,
            _: Option<&dyn OutboundSender>,
            _: Option<&dyn SessionConnector>,
            _: Option<&dyn SessionLink>,
        ) {
        }
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn any_delivery() -> impl Strategy<Value = DeliveryState> {
            prop_oneof![
                Just(DeliveryState::Sent),
                Just(DeliveryState::Delivered),
                Just(DeliveryState::Read),
                Just(DeliveryState::Failed),
            ]
        }

        proptest! {
            #[test]
            fn delivery_never_moves_backwards(a in any_delivery(), b in any_delivery()) {
                let rank = |s: DeliveryState| match s {
                    DeliveryState::Sent => 0,
                    DeliveryState::Delivered => 1,
                    DeliveryState::Read => 2,
                    DeliveryState::Failed => 3,
                };
                if a.can_advance_to(b) {
                    prop_assert!(rank(b) > rank(a));
                }
            }
        }
    }
}
