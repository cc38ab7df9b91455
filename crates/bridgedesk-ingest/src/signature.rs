// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook body signatures (`X-Hub-Signature-256`).

use hmac::{Hmac, Mac};
use sha2::Sha256;

use bridgedesk_core::BridgeError;

/// Header carrying the body signature, lower-cased as HTTP stacks report it.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

type HmacSha256 = Hmac<Sha256>;

/// Checks `header` (`sha256=<hex>`) against the HMAC-SHA256 of `body` keyed
/// with `secret`.
///
/// The digest comparison is constant time.
pub fn verify_signature(secret: &str, body: &[u8], header: &str) -> Result<(), BridgeError> {
    let digest = header
        .trim()
        .strip_prefix("sha256=")
        .ok_or_else(|| BridgeError::Authentication("signature must use sha256=<hex>".into()))?;
    let expected = hex::decode(digest)
        .map_err(|_| BridgeError::Authentication("signature digest is not valid hex".into()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| BridgeError::Internal(format!("hmac key rejected: {e}")))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| BridgeError::Authentication("webhook signature mismatch".into()))
}

/// Signs `body` the way the platforms do. Used by tests and tooling.
pub fn sign(secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length, so construction cannot fail.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}
