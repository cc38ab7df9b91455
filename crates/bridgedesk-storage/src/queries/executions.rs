// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only automation execution records.

use bridgedesk_core::BridgeError;
use bridgedesk_core::types::{AutomationExecution, NewExecution, now_timestamp};
use rusqlite::params;

use crate::database::{Database, enum_col, map_tr_err};

fn execution_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AutomationExecution> {
    Ok(AutomationExecution {
        id: row.get(0)?,
        rule_id: row.get(1)?,
        conversation_id: row.get(2)?,
        message_id: row.get(3)?,
        trigger: enum_col(row, 4)?,
        action: enum_col(row, 5)?,
        status: enum_col(row, 6)?,
        detail: row.get(7)?,
        created_at: row.get(8)?,
    })
}

pub async fn record_execution(
    db: &Database,
    execution: NewExecution,
) -> Result<AutomationExecution, BridgeError> {
    let created_at = now_timestamp();
    db.connection()
        .call(move |conn| -> Result<AutomationExecution, rusqlite::Error> {
            conn.execute(
                "INSERT INTO automation_executions (rule_id, conversation_id, message_id,
                                                    trigger_kind, action_kind, status, detail,
                                                    created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    execution.rule_id,
                    execution.conversation_id,
                    execution.message_id,
                    execution.trigger.to_string(),
                    execution.action.to_string(),
                    execution.status.to_string(),
                    execution.detail,
                    created_at,
                ],
            )?;
            Ok(AutomationExecution {
                id: conn.last_insert_rowid(),
                rule_id: execution.rule_id,
                conversation_id: execution.conversation_id,
                message_id: execution.message_id,
                trigger: execution.trigger,
                action: execution.action,
                status: execution.status,
                detail: execution.detail,
                created_at,
            })
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_executions(
    db: &Database,
    conversation_id: &str,
) -> Result<Vec<AutomationExecution>, BridgeError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<AutomationExecution>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, rule_id, conversation_id, message_id, trigger_kind, action_kind,
                        status, detail, created_at
                 FROM automation_executions WHERE conversation_id = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![conversation_id], execution_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_db;
    use crate::queries::{messages, rules};
    use bridgedesk_core::types::{
        AccountKind, ActionKind, ExecutionStatus, NewRule, Platform, TriggerKind,
    };

    #[tokio::test]
    async fn executions_are_listed_per_conversation() {
        let (db, _dir) = setup_db().await;
        let rule = rules::create_rule(
            &db,
            NewRule {
                name: "welcome".into(),
                trigger: TriggerKind::NewConversation,
                trigger_param: String::new(),
                action: ActionKind::SendMessage,
                action_param: "Bienvenido".into(),
                priority: 1,
                active: true,
                platforms: Default::default(),
            },
        )
        .await
        .unwrap();
        let (_, conv) =
            messages::resolve_for_outbound(&db, Platform::Whatsapp, AccountKind::CloudApi, "521")
                .await
                .unwrap();

        let recorded = record_execution(
            &db,
            NewExecution {
                rule_id: rule.id,
                conversation_id: conv.id.clone(),
                message_id: None,
                trigger: rule.trigger,
                action: rule.action,
                status: ExecutionStatus::Failed,
                detail: Some("no active account for whatsapp".into()),
            },
        )
        .await
        .unwrap();

        let listed = list_executions(&db, &conv.id).await.unwrap();
        assert_eq!(listed, vec![recorded]);
        assert!(list_executions(&db, "other").await.unwrap().is_empty());
        db.close().await.unwrap();
    }
}
