// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All access is serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::str::FromStr;
use std::time::Duration;

use bridgedesk_core::BridgeError;
use tracing::debug;

use crate::migrations;

/// Options applied when the database is opened.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    pub wal_mode: bool,
    pub busy_timeout: Duration,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            wal_mode: true,
            busy_timeout: Duration::from_millis(5_000),
        }
    }
}

/// Handle to the single SQLite writer.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Opens (or creates) the database at `path` with default options and
    /// runs pending migrations.
    pub async fn open(path: &str) -> Result<Self, BridgeError> {
        Self::open_with(path, OpenOptions::default()).await
    }

    pub async fn open_with(path: &str, options: OpenOptions) -> Result<Self, BridgeError> {
        if let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(BridgeError::persistence)?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(BridgeError::persistence)?;

        let busy_ms = options.busy_timeout.as_millis() as u64;
        let wal = options.wal_mode;
        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            if wal {
                // journal_mode returns a row, so it cannot go through execute_batch.
                let _mode: String =
                    conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
            }
            conn.execute_batch(&format!(
                "PRAGMA busy_timeout = {busy_ms};
                 PRAGMA foreign_keys = ON;
                 PRAGMA synchronous = NORMAL;"
            ))?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(|conn| -> Result<(), refinery::Error> {
            migrations::run_migrations(conn)
        })
        .await
        .map_err(BridgeError::persistence)?;

        debug!(path, wal, "database opened");
        Ok(Self { conn })
    }

    /// The underlying connection. Every query goes through `call()` on it.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoints the WAL and closes the connection.
    pub async fn close(self) -> Result<(), BridgeError> {
        checkpoint(&self.conn).await?;
        self.conn.close().await.map_err(BridgeError::persistence)
    }
}

pub(crate) async fn checkpoint(conn: &tokio_rusqlite::Connection) -> Result<(), BridgeError> {
    conn.call(|conn| -> Result<(), rusqlite::Error> {
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    })
    .await
    .map_err(map_tr_err)
}

/// Convert a tokio-rusqlite error into BridgeError::Persistence.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> BridgeError {
    BridgeError::Persistence {
        source: Box::new(e),
    }
}

/// Reads a TEXT column into a strum-parsed enum.
pub(crate) fn enum_col<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
