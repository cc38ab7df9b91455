// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only log of raw inbound payloads.

use bridgedesk_core::BridgeError;
use bridgedesk_core::types::{Platform, WebhookLogEntry};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, enum_col, map_tr_err};

const ENTRY_COLUMNS: &str = "id, platform, source, payload, received_at, processed_at, error";

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<WebhookLogEntry> {
    Ok(WebhookLogEntry {
        id: row.get(0)?,
        platform: enum_col(row, 1)?,
        source: row.get(2)?,
        payload: row.get(3)?,
        received_at: row.get(4)?,
        processed_at: row.get(5)?,
        error: row.get(6)?,
    })
}

pub async fn append_webhook(
    db: &Database,
    platform: Platform,
    source: &str,
    payload: &str,
) -> Result<i64, BridgeError> {
    let source = source.to_string();
    let payload = payload.to_string();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.execute(
                "INSERT INTO webhook_log (platform, source, payload) VALUES (?1, ?2, ?3)",
                params![platform.to_string(), source, payload],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn mark_processed(db: &Database, id: i64) -> Result<(), BridgeError> {
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE webhook_log SET processed_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                        error = NULL
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn mark_failed(db: &Database, id: i64, error: &str) -> Result<(), BridgeError> {
    let error = error.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE webhook_log SET processed_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                        error = ?2
                 WHERE id = ?1",
                params![id, error],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_webhook(db: &Database, id: i64) -> Result<Option<WebhookLogEntry>, BridgeError> {
    db.connection()
        .call(move |conn| -> Result<Option<WebhookLogEntry>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM webhook_log WHERE id = ?1"),
                params![id],
                entry_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Oldest entries that carry an error annotation.
pub async fn failed_webhooks(
    db: &Database,
    limit: usize,
) -> Result<Vec<WebhookLogEntry>, BridgeError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| -> Result<Vec<WebhookLogEntry>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTRY_COLUMNS} FROM webhook_log
                 WHERE error IS NOT NULL ORDER BY id LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit], entry_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_db;

    #[tokio::test]
    async fn failed_entries_are_listed_until_processed() {
        let (db, _dir) = setup_db().await;
        let ok = append_webhook(&db, Platform::Whatsapp, "cloud_api", "{}").await.unwrap();
        let bad = append_webhook(&db, Platform::Messenger, "page_api", "{\"x\":1}")
            .await
            .unwrap();
        mark_processed(&db, ok).await.unwrap();
        mark_failed(&db, bad, "persistence error: disk I/O").await.unwrap();

        let failed = failed_webhooks(&db, 10).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, bad);
        assert_eq!(failed[0].platform, Platform::Messenger);
        assert_eq!(failed[0].source, "page_api");
        assert!(failed[0].processed_at.is_some());

        // A successful replay clears the annotation.
        mark_processed(&db, bad).await.unwrap();
        assert!(failed_webhooks(&db, 10).await.unwrap().is_empty());
        let entry = get_webhook(&db, bad).await.unwrap().unwrap();
        assert!(entry.error.is_none());
        assert_eq!(entry.payload, "{\"x\":1}");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn failed_list_respects_limit() {
        let (db, _dir) = setup_db().await;
        for _ in 0..5 {
            let id = append_webhook(&db, Platform::Instagram, "page_api", "{}").await.unwrap();
            mark_failed(&db, id, "boom").await.unwrap();
        }
        assert_eq!(failed_webhooks(&db, 3).await.unwrap().len(), 3);
        db.close().await.unwrap();
    }
}
