// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Temp-directory SQLite storage for integration tests.

use std::sync::Arc;

use tempfile::TempDir;

use bridgedesk_config::model::StorageConfig;
use bridgedesk_core::types::{Account, AccountKind, Platform};
use bridgedesk_core::{BridgeError, StorageAdapter};
use bridgedesk_storage::SqliteStorage;

/// Initialized storage backed by a file in a temp directory.
///
/// The directory is removed when the value is dropped.
pub struct TestStorage {
    pub storage: Arc<SqliteStorage>,
    pub path: String,
    _temp_dir: TempDir,
}

impl TestStorage {
    pub async fn new() -> Result<Self, BridgeError> {
        let temp_dir = TempDir::new().map_err(BridgeError::persistence)?;
        let path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let storage = SqliteStorage::new(StorageConfig {
            database_path: path.clone(),
            ..StorageConfig::default()
        });
        storage.initialize().await?;
        Ok(Self {
            storage: Arc::new(storage),
            path,
            _temp_dir: temp_dir,
        })
    }

    /// The storage as a trait object, the way services receive it.
    pub fn adapter(&self) -> Arc<dyn StorageAdapter> {
        self.storage.clone()
    }

    /// Inserts `account` and makes it active for its platform.
    pub async fn activate(&self, account: &Account) -> Result<(), BridgeError> {
        self.storage.upsert_account(account).await?;
        self.storage
            .set_active_account(account.platform, &account.id)
            .await
    }

    /// Inserts and activates a complete account of `kind` for `platform`.
    pub async fn active_account(
        &self,
        id: &str,
        platform: Platform,
        kind: AccountKind,
    ) -> Result<Account, BridgeError> {
        let mut account = Account::new(id, platform, kind);
        match kind {
            AccountKind::CloudApi => {
                account.access_token = Some("test-token".into());
                account.phone_number_id = Some("100200300".into());
            }
            AccountKind::PageApi => {
                account.access_token = Some("test-token".into());
                account.page_id = Some("9000".into());
            }
            AccountKind::PairedSession => {}
        }
        self.activate(&account).await?;
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_initialized_storage_with_active_account() {
        let harness = TestStorage::new().await.unwrap();
        let account = harness
            .active_account("wa-cloud", Platform::Whatsapp, AccountKind::CloudApi)
            .await
            .unwrap();
        let active = harness
            .storage
            .active_account(Platform::Whatsapp)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.id, account.id);
        assert!(active.missing_credential().is_none());
    }
}
