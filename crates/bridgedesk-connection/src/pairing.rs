// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Terminal rendering of pairing codes.

use qrcode::QrCode;
use qrcode::render::unicode;

use bridgedesk_core::BridgeError;
use bridgedesk_core::types::PairingChallenge;

/// Renders `code` as a QR image made of unicode half blocks.
///
/// Colors are inverted so the code scans on dark terminal backgrounds.
pub fn render_pairing(code: &str) -> Result<PairingChallenge, BridgeError> {
    let qr = QrCode::new(code.as_bytes())
        .map_err(|e| BridgeError::Validation(format!("pairing code cannot be rendered: {e}")))?;
    let rendered = qr
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .quiet_zone(true)
        .build();
    Ok(PairingChallenge {
        code: code.to_string(),
        rendered,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_multiline_block_image() {
        let challenge = render_pairing("2@Xk3v9pQ,abcDEF==,ghiJKL==,mnoPQR==").unwrap();
        assert_eq!(challenge.code, "2@Xk3v9pQ,abcDEF==,ghiJKL==,mnoPQR==");
        assert!(challenge.rendered.lines().count() > 10);
        assert!(challenge.rendered.contains('█') || challenge.rendered.contains('▀'));
    }

    #[test]
    fn oversized_code_is_rejected() {
        let code = "x".repeat(5000);
        assert_eq!(render_pairing(&code).unwrap_err().kind(), "validation");
    }
}
