// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recipient address validation.

use bridgedesk_core::BridgeError;
use bridgedesk_core::types::Platform;

/// Shortest and longest E.164 subscriber numbers accepted for WhatsApp.
const MIN_PHONE_DIGITS: usize = 8;
const MAX_PHONE_DIGITS: usize = 15;

/// Normalizes a raw platform address.
///
/// WhatsApp numbers lose `+`, spaces, dashes and parentheses and must then
/// be 8 to 15 digits. Messenger and Instagram scoped ids are taken verbatim
/// but may not be empty or contain whitespace.
pub fn normalize_address(platform: Platform, raw: &str) -> Result<String, BridgeError> {
    match platform {
        Platform::Whatsapp => {
            let digits: String = raw
                .chars()
                .filter(|c| !matches!(c, '+' | ' ' | '-' | '(' | ')'))
                .collect();
            let valid = (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len())
                && digits.chars().all(|c| c.is_ascii_digit());
            if valid {
                Ok(digits)
            } else {
                Err(BridgeError::Validation(format!(
                    "invalid whatsapp number '{raw}': expected {MIN_PHONE_DIGITS}-{MAX_PHONE_DIGITS} digits"
                )))
            }
        }
        Platform::Messenger | Platform::Instagram => {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
                Err(BridgeError::Validation(format!(
                    "invalid {platform} recipient id '{raw}'"
                )))
            } else {
                Ok(trimmed.to_string())
            }
        }
    }
}
