// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;

use bridgedesk_core::types::Account;
use bridgedesk_core::{BridgeError, SessionConnector, SessionLink};

/// Connector for builds without a paired-session transport.
///
/// Paired accounts settle in `error` with this message; token-based
/// accounts are unaffected.
pub struct UnlinkedConnector;

#[async_trait]
impl SessionConnector for UnlinkedConnector {
    async fn connect(
        &self,
        account: &Account,
        _credentials: Option<String>,
    ) -> Result<Box<dyn SessionLink>, BridgeError> {
        Err(BridgeError::Configuration(format!(
            "no paired-session transport is linked in; cannot connect {}",
            account.id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridgedesk_core::types::{AccountKind, Platform};

    #[tokio::test]
    async fn connect_reports_configuration_error() {
        let account = Account::new("wa-web", Platform::Whatsapp, AccountKind::PairedSession);
        let err = UnlinkedConnector.connect(&account, None).await.err().unwrap();
        assert!(matches!(err, BridgeError::Configuration(_)));
        assert!(err.to_string().contains("wa-web"));
    }
}
