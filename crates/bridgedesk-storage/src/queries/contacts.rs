// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contact resolution and tagging.

use bridgedesk_core::BridgeError;
use bridgedesk_core::types::{Contact, ContactState, Platform, now_timestamp};
use rusqlite::{Connection, OptionalExtension, params};

use crate::database::{Database, enum_col, map_tr_err, new_id};

const CONTACT_COLUMNS: &str = "id, platform, external_id, name, state, created_at, updated_at";

fn contact_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: row.get(0)?,
        platform: enum_col(row, 1)?,
        external_id: row.get(2)?,
        name: row.get(3)?,
        state: enum_col(row, 4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub(crate) fn find_by_external(
    conn: &Connection,
    platform: Platform,
    external_id: &str,
) -> rusqlite::Result<Option<Contact>> {
    conn.query_row(
        &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE platform = ?1 AND external_id = ?2"),
        params![platform.to_string(), external_id],
        contact_from_row,
    )
    .optional()
}

/// Resolve the contact for `(platform, external_id)`, creating it if absent.
///
/// Uses insert-or-ignore against the unique key, so two racing first
/// contacts settle on one row. A supplied `name` replaces a placeholder
/// name on an existing contact. Returns the contact and whether it was created.
pub(crate) fn resolve_tx(
    conn: &Connection,
    platform: Platform,
    external_id: &str,
    name: Option<&str>,
    placeholder: &str,
) -> rusqlite::Result<(Contact, bool)> {
    let now = now_timestamp();
    let supplied = name.filter(|n| !n.trim().is_empty());
    let inserted = conn.execute(
        "INSERT INTO contacts (id, platform, external_id, name, state, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 'new', ?5, ?5)
         ON CONFLICT(platform, external_id) DO NOTHING",
        params![
            new_id(),
            platform.to_string(),
            external_id,
            supplied.unwrap_or(placeholder),
            now
        ],
    )?;

    if let (0, Some(name)) = (inserted, supplied) {
        conn.execute(
            "UPDATE contacts SET name = ?3, updated_at = ?4
             WHERE platform = ?1 AND external_id = ?2 AND name = ?5",
            params![platform.to_string(), external_id, name, now, placeholder],
        )?;
    }

    let contact = find_by_external(conn, platform, external_id)?
        .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
    Ok((contact, inserted > 0))
}

pub(crate) fn mark_active_tx(conn: &Connection, contact_id: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE contacts SET state = ?2, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
         WHERE id = ?1 AND state <> ?2",
        params![contact_id, ContactState::Active.to_string()],
    )?;
    Ok(())
}

pub async fn get_contact(db: &Database, id: &str) -> Result<Option<Contact>, BridgeError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Contact>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?1"),
                params![id],
                contact_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn find_contact(
    db: &Database,
    platform: Platform,
    external_id: &str,
) -> Result<Option<Contact>, BridgeError> {
    let external_id = external_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Contact>, rusqlite::Error> {
            find_by_external(conn, platform, &external_id)
        })
        .await
        .map_err(map_tr_err)
}

/// Attach `tag` to a contact, creating the tag on first use.
pub async fn tag_contact(db: &Database, contact_id: &str, tag: &str) -> Result<(), BridgeError> {
    let tag = tag.trim().to_string();
    if tag.is_empty() {
        return Err(BridgeError::Validation("tag name must not be empty".into()));
    }
    let owned_id = contact_id.to_string();
    let tagged = db
        .connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let tx = conn.transaction()?;
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM contacts WHERE id = ?1)",
                params![owned_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Ok(false);
            }
            tx.execute(
                "INSERT INTO tags (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
                params![tag],
            )?;
            tx.execute(
                "INSERT INTO contact_tags (contact_id, tag_id)
                 SELECT ?1, id FROM tags WHERE name = ?2
                 ON CONFLICT(contact_id, tag_id) DO NOTHING",
                params![owned_id, tag],
            )?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)?;
    if tagged {
        Ok(())
    } else {
        Err(BridgeError::not_found("contact", contact_id))
    }
}

pub async fn contact_tags(db: &Database, contact_id: &str) -> Result<Vec<String>, BridgeError> {
    let contact_id = contact_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<String>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT t.name FROM contact_tags ct JOIN tags t ON t.id = ct.tag_id
                 WHERE ct.contact_id = ?1 ORDER BY t.name",
            )?;
            let rows = stmt.query_map(params![contact_id], |row| row.get(0))?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_db;

    async fn resolve(
        db: &Database,
        external_id: &str,
        name: Option<&str>,
    ) -> (Contact, bool) {
        let external_id = external_id.to_string();
        let name = name.map(str::to_string);
        db.connection()
            .call(move |conn| -> Result<(Contact, bool), rusqlite::Error> {
                let placeholder = format!("+{external_id}");
                resolve_tx(conn, Platform::Whatsapp, &external_id, name.as_deref(), &placeholder)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn same_external_id_resolves_to_same_contact() {
        let (db, _dir) = setup_db().await;
        let (first, created) = resolve(&db, "5215511111111", Some("Ana")).await;
        assert!(created);
        assert_eq!(first.state, ContactState::New);

        let (second, created) = resolve(&db, "5215511111111", None).await;
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Ana");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn placeholder_name_is_upgraded_once_known() {
        let (db, _dir) = setup_db().await;
        let (contact, _) = resolve(&db, "5215522222222", None).await;
        assert_eq!(contact.name, "+5215522222222");

        let (contact, _) = resolve(&db, "5215522222222", Some("Luis")).await;
        assert_eq!(contact.name, "Luis");

        // A real name is never overwritten by a later one.
        let (contact, _) = resolve(&db, "5215522222222", Some("Luis M.")).await;
        assert_eq!(contact.name, "Luis");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_first_contacts_settle_on_one_row() {
        let (db, _dir) = setup_db().await;
        let db = std::sync::Arc::new(db);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                resolve(&db, "5215533333333", None).await.0.id
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test]
    async fn tags_are_created_once_and_attached_idempotently() {
        let (db, _dir) = setup_db().await;
        let (contact, _) = resolve(&db, "5215544444444", None).await;

        tag_contact(&db, &contact.id, "vip").await.unwrap();
        tag_contact(&db, &contact.id, "VIP").await.unwrap();
        tag_contact(&db, &contact.id, "lead").await.unwrap();

        let tags = contact_tags(&db, &contact.id).await.unwrap();
        assert_eq!(tags, vec!["lead".to_string(), "vip".to_string()]);

        let err = tag_contact(&db, "ghost", "vip").await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
        db.close().await.unwrap();
    }
}
