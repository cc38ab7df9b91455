// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message writes. Inbound and outbound recording are single transactions
//! covering contact, conversation, message, and counters.

use bridgedesk_core::BridgeError;
use bridgedesk_core::types::{
    AccountKind, Contact, Conversation, DeliveryState, Direction, InboundOutcome, IngestRecord,
    Message, NewInbound, NewOutbound, Platform, now_timestamp, placeholder_contact_name,
};
use rusqlite::{Connection, OptionalExtension, params};

use crate::database::{Database, enum_col, map_tr_err, new_id};
use crate::queries::{contacts, conversations};

const MESSAGE_COLUMNS: &str = "id, conversation_id, direction, message_type, content, media_url,
     delivery_state, external_id, created_at";

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        direction: enum_col(row, 2)?,
        message_type: enum_col(row, 3)?,
        content: row.get(4)?,
        media_url: row.get(5)?,
        delivery_state: enum_col(row, 6)?,
        external_id: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn insert_tx(conn: &Connection, message: &Message) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO messages (id, conversation_id, direction, message_type, content, media_url,
                               delivery_state, external_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            message.id,
            message.conversation_id,
            message.direction.to_string(),
            message.message_type.to_string(),
            message.content,
            message.media_url,
            message.delivery_state.to_string(),
            message.external_id,
            message.created_at,
        ],
    )?;
    Ok(())
}

/// Store one inbound message and everything it implies, atomically.
///
/// An external message id that was already stored yields
/// [`InboundOutcome::Duplicate`] and writes nothing.
pub async fn record_inbound(
    db: &Database,
    inbound: NewInbound,
) -> Result<InboundOutcome, BridgeError> {
    if inbound.event.external_sender_id.trim().is_empty() {
        return Err(BridgeError::Validation(
            "inbound event has no sender id".into(),
        ));
    }
    db.connection()
        .call(move |conn| -> Result<InboundOutcome, rusqlite::Error> {
            let tx = conn.transaction()?;
            let event = &inbound.event;

            if let Some(external_id) = &event.external_message_id {
                let existing: Option<String> = tx
                    .query_row(
                        "SELECT id FROM messages WHERE direction = 'inbound' AND external_id = ?1",
                        params![external_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                if let Some(message_id) = existing {
                    return Ok(InboundOutcome::Duplicate { message_id });
                }
            }

            let placeholder = placeholder_contact_name(inbound.platform, &event.external_sender_id);
            let (contact, contact_created) = contacts::resolve_tx(
                &tx,
                inbound.platform,
                &event.external_sender_id,
                event.sender_name.as_deref(),
                &placeholder,
            )?;
            let (opened, conversation_created) = conversations::resolve_tx(
                &tx,
                &contact.id,
                inbound.platform,
                inbound.channel_kind,
                inbound.reuse_closed,
            )?;
            let conversation_id = opened.id;

            let message = Message {
                id: new_id(),
                conversation_id: conversation_id.clone(),
                direction: Direction::Inbound,
                message_type: event.message_type,
                content: event.content.clone(),
                media_url: event.media_url.clone(),
                delivery_state: DeliveryState::Delivered,
                external_id: event.external_message_id.clone(),
                created_at: now_timestamp(),
            };
            insert_tx(&tx, &message)?;
            conversations::bump_tx(&tx, &conversation_id, Direction::Inbound)?;
            let conversation = conversations::get_tx(&tx, &conversation_id)?
                .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
            tx.commit()?;

            Ok(InboundOutcome::Stored(Box::new(IngestRecord {
                contact,
                conversation,
                message,
                contact_created,
                conversation_created,
            })))
        })
        .await
        .map_err(map_tr_err)
}

/// Store a sent message, bump counters, and mark the contact active.
pub async fn record_outbound(db: &Database, outbound: NewOutbound) -> Result<Message, BridgeError> {
    let conversation_id = outbound.conversation_id.clone();
    let recorded = db
        .connection()
        .call(move |conn| -> Result<Option<Message>, rusqlite::Error> {
            let tx = conn.transaction()?;
            let Some(conversation) = conversations::get_tx(&tx, &outbound.conversation_id)? else {
                return Ok(None);
            };
            let message = Message {
                id: new_id(),
                conversation_id: conversation.id.clone(),
                direction: Direction::Outbound,
                message_type: outbound.message_type,
                content: outbound.content,
                media_url: outbound.media_url,
                delivery_state: outbound.delivery_state,
                external_id: outbound.external_id,
                created_at: now_timestamp(),
            };
            insert_tx(&tx, &message)?;
            conversations::bump_tx(&tx, &conversation.id, Direction::Outbound)?;
            contacts::mark_active_tx(&tx, &conversation.contact_id)?;
            tx.commit()?;
            Ok(Some(message))
        })
        .await
        .map_err(map_tr_err)?;
    recorded.ok_or_else(|| BridgeError::not_found("conversation", conversation_id))
}

/// Resolve or create the contact and open conversation for a raw-address send.
pub async fn resolve_for_outbound(
    db: &Database,
    platform: Platform,
    channel_kind: AccountKind,
    external_id: &str,
) -> Result<(Contact, Conversation), BridgeError> {
    let external_id = external_id.to_string();
    db.connection()
        .call(move |conn| -> Result<(Contact, Conversation), rusqlite::Error> {
            let tx = conn.transaction()?;
            let placeholder = placeholder_contact_name(platform, &external_id);
            let (contact, _) =
                contacts::resolve_tx(&tx, platform, &external_id, None, &placeholder)?;
            let (conversation, _) =
                conversations::resolve_tx(&tx, &contact.id, platform, channel_kind, false)?;
            tx.commit()?;
            Ok((contact, conversation))
        })
        .await
        .map_err(map_tr_err)
}

/// Move a message's delivery state forward. Returns whether anything changed.
pub async fn update_delivery_state(
    db: &Database,
    external_id: &str,
    state: DeliveryState,
) -> Result<bool, BridgeError> {
    let external_id = external_id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let tx = conn.transaction()?;
            let current = tx
                .query_row(
                    "SELECT id, delivery_state FROM messages
                     WHERE direction = 'outbound' AND external_id = ?1",
                    params![external_id],
                    |row| Ok((row.get::<_, String>(0)?, enum_col::<DeliveryState>(row, 1)?)),
                )
                .optional()?;
            let Some((id, from)) = current else {
                return Ok(false);
            };
            if !from.can_advance_to(state) {
                return Ok(false);
            }
            tx.execute(
                "UPDATE messages SET delivery_state = ?2 WHERE id = ?1",
                params![id, state.to_string()],
            )?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn last_outbound_at(
    db: &Database,
    conversation_id: &str,
) -> Result<Option<String>, BridgeError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<String>, rusqlite::Error> {
            conn.query_row(
                "SELECT MAX(created_at) FROM messages
                 WHERE conversation_id = ?1 AND direction = 'outbound'",
                params![conversation_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_messages(
    db: &Database,
    conversation_id: &str,
) -> Result<Vec<Message>, BridgeError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<Message>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE conversation_id = ?1 ORDER BY created_at, rowid"
            ))?;
            let rows = stmt.query_map(params![conversation_id], message_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_db;
    use bridgedesk_core::types::{ContactState, ConversationState, InboundEvent, MessageType};

    fn inbound(sender: &str, content: &str, external_id: Option<&str>) -> NewInbound {
        let mut event = InboundEvent::text(sender, content);
        event.external_message_id = external_id.map(str::to_string);
        NewInbound {
            platform: Platform::Whatsapp,
            channel_kind: AccountKind::CloudApi,
            event,
            reuse_closed: false,
        }
    }

    fn stored(outcome: InboundOutcome) -> IngestRecord {
        match outcome {
            InboundOutcome::Stored(record) => *record,
            InboundOutcome::Duplicate { .. } => panic!("expected a stored message"),
        }
    }

    #[tokio::test]
    async fn first_inbound_creates_contact_and_conversation() {
        let (db, _dir) = setup_db().await;
        let record = stored(
            record_inbound(&db, inbound("5215500000001", "hola", Some("wamid.1")))
                .await
                .unwrap(),
        );

        assert!(record.contact_created);
        assert!(record.conversation_created);
        assert_eq!(record.contact.name, "+5215500000001");
        assert_eq!(record.contact.state, ContactState::New);
        assert_eq!(record.conversation.message_count, 1);
        assert_eq!(record.conversation.inbound_count, 1);
        assert_eq!(record.message.delivery_state, DeliveryState::Delivered);
        assert_eq!(record.message.direction, Direction::Inbound);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn second_inbound_reuses_contact_and_conversation() {
        let (db, _dir) = setup_db().await;
        let first = stored(record_inbound(&db, inbound("521", "uno", None)).await.unwrap());
        let second = stored(record_inbound(&db, inbound("521", "dos", None)).await.unwrap());

        assert_eq!(first.contact.id, second.contact.id);
        assert_eq!(first.conversation.id, second.conversation.id);
        assert!(!second.contact_created);
        assert!(!second.conversation_created);
        assert_eq!(second.conversation.message_count, 2);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_external_id_is_suppressed() {
        let (db, _dir) = setup_db().await;
        let first = stored(
            record_inbound(&db, inbound("521", "hola", Some("wamid.dup")))
                .await
                .unwrap(),
        );
        let again = record_inbound(&db, inbound("521", "hola", Some("wamid.dup")))
            .await
            .unwrap();
        assert_eq!(
            again,
            InboundOutcome::Duplicate {
                message_id: first.message.id.clone()
            }
        );
        let messages = list_messages(&db, &first.conversation.id).await.unwrap();
        assert_eq!(messages.len(), 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn inbound_after_close_starts_new_conversation_unless_reused() {
        let (db, _dir) = setup_db().await;
        let first = stored(record_inbound(&db, inbound("521", "a", None)).await.unwrap());
        conversations::set_conversation_state(
            &db,
            &first.conversation.id,
            ConversationState::Closed,
        )
        .await
        .unwrap();

        let mut reuse = inbound("521", "b", None);
        reuse.reuse_closed = true;
        let reopened = stored(record_inbound(&db, reuse).await.unwrap());
        assert_eq!(reopened.conversation.id, first.conversation.id);
        assert_eq!(reopened.conversation.state, ConversationState::Open);
        assert!(!reopened.conversation_created);

        conversations::set_conversation_state(
            &db,
            &first.conversation.id,
            ConversationState::Closed,
        )
        .await
        .unwrap();
        let fresh = stored(record_inbound(&db, inbound("521", "c", None)).await.unwrap());
        assert_ne!(fresh.conversation.id, first.conversation.id);
        assert!(fresh.conversation_created);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn outbound_marks_contact_active_and_counts() {
        let (db, _dir) = setup_db().await;
        let first = stored(record_inbound(&db, inbound("521", "hola", None)).await.unwrap());
        assert!(last_outbound_at(&db, &first.conversation.id).await.unwrap().is_none());

        let message = record_outbound(
            &db,
            NewOutbound {
                conversation_id: first.conversation.id.clone(),
                message_type: MessageType::Text,
                content: "Bienvenido".into(),
                media_url: None,
                external_id: Some("wamid.out".into()),
                delivery_state: DeliveryState::Sent,
            },
        )
        .await
        .unwrap();
        assert_eq!(message.direction, Direction::Outbound);

        let conv = conversations::get_conversation(&db, &first.conversation.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conv.outbound_count, 1);
        assert_eq!(conv.message_count, 2);
        let contact = contacts::get_contact(&db, &first.contact.id).await.unwrap().unwrap();
        assert_eq!(contact.state, ContactState::Active);
        assert_eq!(
            last_outbound_at(&db, &first.conversation.id).await.unwrap(),
            Some(message.created_at)
        );
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn outbound_to_missing_conversation_is_not_found() {
        let (db, _dir) = setup_db().await;
        let err = record_outbound(
            &db,
            NewOutbound {
                conversation_id: "ghost".into(),
                message_type: MessageType::Text,
                content: "x".into(),
                media_url: None,
                external_id: None,
                delivery_state: DeliveryState::Sent,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "not_found");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn delivery_state_moves_forward_only() {
        let (db, _dir) = setup_db().await;
        let (_, conv) = resolve_for_outbound(&db, Platform::Whatsapp, AccountKind::CloudApi, "521")
            .await
            .unwrap();
        record_outbound(
            &db,
            NewOutbound {
                conversation_id: conv.id.clone(),
                message_type: MessageType::Text,
                content: "x".into(),
                media_url: None,
                external_id: Some("wamid.s".into()),
                delivery_state: DeliveryState::Sent,
            },
        )
        .await
        .unwrap();

        assert!(update_delivery_state(&db, "wamid.s", DeliveryState::Read).await.unwrap());
        assert!(!update_delivery_state(&db, "wamid.s", DeliveryState::Delivered).await.unwrap());
        assert!(!update_delivery_state(&db, "unknown", DeliveryState::Read).await.unwrap());

        let messages = list_messages(&db, &conv.id).await.unwrap();
        assert_eq!(messages[0].delivery_state, DeliveryState::Read);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn raw_address_send_reuses_inbound_contact() {
        let (db, _dir) = setup_db().await;
        let first = stored(record_inbound(&db, inbound("521", "hola", None)).await.unwrap());
        let (contact, conv) =
            resolve_for_outbound(&db, Platform::Whatsapp, AccountKind::CloudApi, "521")
                .await
                .unwrap();
        assert_eq!(contact.id, first.contact.id);
        assert_eq!(conv.id, first.conversation.id);
        db.close().await.unwrap();
    }
}
