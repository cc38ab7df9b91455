// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Account rows, credentials, and the per-platform active slot.

use bridgedesk_core::BridgeError;
use bridgedesk_core::types::{Account, ConnectionState, Platform};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, enum_col, map_tr_err};

const ACCOUNT_COLUMNS: &str = "a.id, a.platform, a.kind, a.label, a.access_token, a.phone_number_id,
     a.page_id, a.webhook_secret, a.verify_token, a.connection_state, a.remote_identity,
     a.last_error, a.pairing_code, a.created_at, a.updated_at";

fn account_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        platform: enum_col(row, 1)?,
        kind: enum_col(row, 2)?,
        label: row.get(3)?,
        access_token: row.get(4)?,
        phone_number_id: row.get(5)?,
        page_id: row.get(6)?,
        webhook_secret: row.get(7)?,
        verify_token: row.get(8)?,
        connection_state: enum_col(row, 9)?,
        remote_identity: row.get(10)?,
        last_error: row.get(11)?,
        pairing_code: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

/// Insert an account or refresh its configuration fields.
///
/// Runtime fields (connection state, identity, credentials) survive the update.
pub async fn upsert_account(db: &Database, account: &Account) -> Result<(), BridgeError> {
    let a = account.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO accounts (id, platform, kind, label, access_token, phone_number_id,
                                       page_id, webhook_secret, verify_token, connection_state,
                                       created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
                 ON CONFLICT(id) DO UPDATE SET
                     platform = excluded.platform,
                     kind = excluded.kind,
                     label = excluded.label,
                     access_token = excluded.access_token,
                     phone_number_id = excluded.phone_number_id,
                     page_id = excluded.page_id,
                     webhook_secret = excluded.webhook_secret,
                     verify_token = excluded.verify_token,
                     updated_at = excluded.updated_at",
                params![
                    a.id,
                    a.platform.to_string(),
                    a.kind.to_string(),
                    a.label,
                    a.access_token,
                    a.phone_number_id,
                    a.page_id,
                    a.webhook_secret,
                    a.verify_token,
                    a.connection_state.to_string(),
                    a.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_account(db: &Database, id: &str) -> Result<Option<Account>, BridgeError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Account>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts a WHERE a.id = ?1"),
                params![id],
                account_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_accounts(db: &Database) -> Result<Vec<Account>, BridgeError> {
    db.connection()
        .call(|conn| -> Result<Vec<Account>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ACCOUNT_COLUMNS} FROM accounts a ORDER BY a.platform, a.id"
            ))?;
            let rows = stmt.query_map([], account_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

fn ensure_updated(changed: usize, id: &str) -> Result<(), BridgeError> {
    if changed == 0 {
        Err(BridgeError::not_found("account", id))
    } else {
        Ok(())
    }
}

/// Mirror the live connection state into the account row.
pub async fn update_connection(
    db: &Database,
    id: &str,
    state: ConnectionState,
    remote_identity: Option<&str>,
    last_error: Option<&str>,
) -> Result<(), BridgeError> {
    let owned_id = id.to_string();
    let identity = remote_identity.map(str::to_string);
    let error = last_error.map(str::to_string);
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE accounts SET connection_state = ?2,
                        remote_identity = coalesce(?3, remote_identity),
                        last_error = ?4,
                        updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![owned_id, state.to_string(), identity, error],
            )
        })
        .await
        .map_err(map_tr_err)?;
    ensure_updated(changed, id)
}

pub async fn set_pairing_code(
    db: &Database,
    id: &str,
    code: Option<&str>,
) -> Result<(), BridgeError> {
    let owned_id = id.to_string();
    let code = code.map(str::to_string);
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE accounts SET pairing_code = ?2,
                        updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![owned_id, code],
            )
        })
        .await
        .map_err(map_tr_err)?;
    ensure_updated(changed, id)
}

pub async fn save_credentials(db: &Database, id: &str, blob: &str) -> Result<(), BridgeError> {
    let owned_id = id.to_string();
    let blob = blob.to_string();
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE accounts SET credentials = ?2,
                        updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![owned_id, blob],
            )
        })
        .await
        .map_err(map_tr_err)?;
    ensure_updated(changed, id)
}

pub async fn load_credentials(db: &Database, id: &str) -> Result<Option<String>, BridgeError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<String>, rusqlite::Error> {
            let blob: Option<Option<String>> = conn
                .query_row(
                    "SELECT credentials FROM accounts WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(blob.flatten())
        })
        .await
        .map_err(map_tr_err)
}

/// Forget everything a logged-out session knew.
pub async fn purge_credentials(db: &Database, id: &str) -> Result<(), BridgeError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE accounts SET credentials = NULL, pairing_code = NULL,
                        remote_identity = NULL,
                        updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Point the platform's active slot at `account_id` with a single upsert.
pub async fn set_active_account(
    db: &Database,
    platform: Platform,
    account_id: &str,
) -> Result<(), BridgeError> {
    let account_id = account_id.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO active_accounts (platform, account_id) VALUES (?1, ?2)
                 ON CONFLICT(platform) DO UPDATE SET
                     account_id = excluded.account_id,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![platform.to_string(), account_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn active_account(
    db: &Database,
    platform: Platform,
) -> Result<Option<Account>, BridgeError> {
    db.connection()
        .call(move |conn| -> Result<Option<Account>, rusqlite::Error> {
            conn.query_row(
                &format!(
                    "SELECT {ACCOUNT_COLUMNS} FROM active_accounts s
                     JOIN accounts a ON a.id = s.account_id
                     WHERE s.platform = ?1"
                ),
                params![platform.to_string()],
                account_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn clear_active_if(
    db: &Database,
    platform: Platform,
    account_id: &str,
) -> Result<bool, BridgeError> {
    let account_id = account_id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let removed = conn.execute(
                "DELETE FROM active_accounts WHERE platform = ?1 AND account_id = ?2",
                params![platform.to_string(), account_id],
            )?;
            Ok(removed > 0)
        })
        .await
        .map_err(map_tr_err)
}
