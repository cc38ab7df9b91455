// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation resolution, counters, and state changes.

use bridgedesk_core::BridgeError;
use bridgedesk_core::types::{
    AccountKind, Conversation, ConversationState, Direction, Platform, now_timestamp,
};
use rusqlite::{Connection, OptionalExtension, params};

use crate::database::{Database, enum_col, map_tr_err, new_id};

pub(crate) const CONVERSATION_COLUMNS: &str = "id, contact_id, platform, channel_kind, state,
     assigned_agent, inbound_count, outbound_count, message_count, last_activity_at, created_at";

pub(crate) fn conversation_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        contact_id: row.get(1)?,
        platform: enum_col(row, 2)?,
        channel_kind: enum_col(row, 3)?,
        state: enum_col(row, 4)?,
        assigned_agent: row.get(5)?,
        inbound_count: row.get(6)?,
        outbound_count: row.get(7)?,
        message_count: row.get(8)?,
        last_activity_at: row.get(9)?,
        created_at: row.get(10)?,
    })
}

pub(crate) fn get_tx(conn: &Connection, id: &str) -> rusqlite::Result<Option<Conversation>> {
    conn.query_row(
        &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"),
        params![id],
        conversation_from_row,
    )
    .optional()
}

/// Resolve the open conversation for a contact on one channel, creating one if none exists.
///
/// With `reuse_closed`, the most recent closed conversation is reopened
/// instead of creating a new one. Returns the conversation and whether it
/// was created.
pub(crate) fn resolve_tx(
    conn: &Connection,
    contact_id: &str,
    platform: Platform,
    channel_kind: AccountKind,
    reuse_closed: bool,
) -> rusqlite::Result<(Conversation, bool)> {
    let open = conn
        .query_row(
            &format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations
                 WHERE contact_id = ?1 AND platform = ?2 AND channel_kind = ?3
                   AND state <> 'closed'
                 ORDER BY last_activity_at DESC LIMIT 1"
            ),
            params![contact_id, platform.to_string(), channel_kind.to_string()],
            conversation_from_row,
        )
        .optional()?;
    if let Some(conversation) = open {
        return Ok((conversation, false));
    }

    if reuse_closed {
        let reopened: Option<String> = conn
            .query_row(
                "UPDATE conversations SET state = 'open'
                 WHERE id = (
                     SELECT id FROM conversations
                     WHERE contact_id = ?1 AND platform = ?2 AND channel_kind = ?3
                       AND state = 'closed'
                     ORDER BY last_activity_at DESC, rowid DESC LIMIT 1
                 )
                 RETURNING id",
                params![contact_id, platform.to_string(), channel_kind.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = reopened {
            let conversation = get_tx(conn, &id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
            return Ok((conversation, false));
        }
    }

    let now = now_timestamp();
    let id = new_id();
    let inserted = conn.execute(
        "INSERT INTO conversations (id, contact_id, platform, channel_kind, state,
                                    last_activity_at, created_at)
         VALUES (?1, ?2, ?3, ?4, 'open', ?5, ?5)
         ON CONFLICT DO NOTHING",
        params![id, contact_id, platform.to_string(), channel_kind.to_string(), now],
    )?;
    if inserted == 0 {
        // Lost a race against another writer; the winner's row is the open one.
        return resolve_tx(conn, contact_id, platform, channel_kind, false);
    }
    let conversation = get_tx(conn, &id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
    Ok((conversation, true))
}

/// Count one message in `direction` and refresh the activity timestamp.
///
/// An inbound message on a closed conversation reopens it.
pub(crate) fn bump_tx(
    conn: &Connection,
    conversation_id: &str,
    direction: Direction,
) -> rusqlite::Result<()> {
    let sql = match direction {
        Direction::Inbound => {
            "UPDATE conversations SET inbound_count = inbound_count + 1,
                    message_count = message_count + 1,
                    last_activity_at = ?2,
                    state = CASE WHEN state = 'closed' THEN 'open' ELSE state END
             WHERE id = ?1"
        }
        Direction::Outbound => {
            "UPDATE conversations SET outbound_count = outbound_count + 1,
                    message_count = message_count + 1,
                    last_activity_at = ?2
             WHERE id = ?1"
        }
    };
    conn.execute(sql, params![conversation_id, now_timestamp()])?;
    Ok(())
}

pub async fn get_conversation(
    db: &Database,
    id: &str,
) -> Result<Option<Conversation>, BridgeError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Conversation>, rusqlite::Error> { get_tx(conn, &id) })
        .await
        .map_err(map_tr_err)
}

pub async fn assign_agent(
    db: &Database,
    conversation_id: &str,
    agent: &str,
) -> Result<(), BridgeError> {
    let owned_id = conversation_id.to_string();
    let agent = agent.to_string();
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE conversations SET assigned_agent = ?2 WHERE id = ?1",
                params![owned_id, agent],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(BridgeError::not_found("conversation", conversation_id));
    }
    Ok(())
}

/// Change a conversation's state.
///
/// Reopening fails with a validation error when another conversation for
/// the same contact and channel is already open.
pub async fn set_conversation_state(
    db: &Database,
    conversation_id: &str,
    state: ConversationState,
) -> Result<(), BridgeError> {
    let owned_id = conversation_id.to_string();
    let changed = db
        .connection()
        .call(move |conn| -> Result<Option<usize>, rusqlite::Error> {
            let result = conn.execute(
                "UPDATE conversations SET state = ?2 WHERE id = ?1",
                params![owned_id, state.to_string()],
            );
            match result {
                Ok(n) => Ok(Some(n)),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)?;
    match changed {
        Some(0) => Err(BridgeError::not_found("conversation", conversation_id)),
        Some(_) => Ok(()),
        None => Err(BridgeError::Validation(format!(
            "conversation {conversation_id} cannot become {state}: another conversation is open"
        ))),
    }
}
