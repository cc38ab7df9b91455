// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Automation rule rows.
//!
//! The platform set is stored as a JSON array of platform names; an empty
//! array means every platform.

use std::collections::BTreeSet;

use bridgedesk_core::BridgeError;
use bridgedesk_core::types::{AutomationRule, NewRule, Platform, now_timestamp};
use rusqlite::{OptionalExtension, params};
use tracing::warn;

use crate::database::{Database, enum_col, map_tr_err};

const RULE_COLUMNS: &str = "id, name, trigger_kind, trigger_param, action_kind, action_param,
     priority, active, platforms, created_at";

fn encode_platforms(platforms: &BTreeSet<Platform>) -> String {
    let names: Vec<String> = platforms.iter().map(|p| p.to_string()).collect();
    serde_json::Value::from(names).to_string()
}

/// Unknown names are dropped; storage-side filtering already excluded
/// rules whose set names no known platform.
fn decode_platforms(rule_id: i64, raw: &str) -> BTreeSet<Platform> {
    let names: Vec<String> = match serde_json::from_str(raw) {
        Ok(names) => names,
        Err(e) => {
            warn!(rule_id, raw, error = %e, "rule platform set is not a JSON array");
            return BTreeSet::new();
        }
    };
    names
        .iter()
        .filter_map(|name| match name.parse::<Platform>() {
            Ok(platform) => Some(platform),
            Err(_) => {
                warn!(rule_id, platform = %name, "ignoring unknown platform in rule");
                None
            }
        })
        .collect()
}

fn rule_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AutomationRule> {
    let id: i64 = row.get(0)?;
    let platforms: String = row.get(8)?;
    Ok(AutomationRule {
        id,
        name: row.get(1)?,
        trigger: enum_col(row, 2)?,
        trigger_param: row.get(3)?,
        action: enum_col(row, 4)?,
        action_param: row.get(5)?,
        priority: row.get(6)?,
        active: row.get(7)?,
        platforms: decode_platforms(id, &platforms),
        created_at: row.get(9)?,
    })
}

pub async fn create_rule(db: &Database, rule: NewRule) -> Result<AutomationRule, BridgeError> {
    let created_at = now_timestamp();
    db.connection()
        .call(move |conn| -> Result<AutomationRule, rusqlite::Error> {
            conn.execute(
                "INSERT INTO automation_rules (name, trigger_kind, trigger_param, action_kind,
                                               action_param, priority, active, platforms,
                                               created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    rule.name,
                    rule.trigger.to_string(),
                    rule.trigger_param,
                    rule.action.to_string(),
                    rule.action_param,
                    rule.priority,
                    rule.active,
                    encode_platforms(&rule.platforms),
                    created_at,
                ],
            )?;
            Ok(AutomationRule {
                id: conn.last_insert_rowid(),
                name: rule.name,
                trigger: rule.trigger,
                trigger_param: rule.trigger_param,
                action: rule.action,
                action_param: rule.action_param,
                priority: rule.priority,
                active: rule.active,
                platforms: rule.platforms,
                created_at,
            })
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_rule(db: &Database, id: i64) -> Result<Option<AutomationRule>, BridgeError> {
    db.connection()
        .call(move |conn| -> Result<Option<AutomationRule>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {RULE_COLUMNS} FROM automation_rules WHERE id = ?1"),
                params![id],
                rule_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_rules(db: &Database) -> Result<Vec<AutomationRule>, BridgeError> {
    db.connection()
        .call(|conn| -> Result<Vec<AutomationRule>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RULE_COLUMNS} FROM automation_rules ORDER BY priority, id"
            ))?;
            let rows = stmt.query_map([], rule_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Active rules for `platform`, lowest priority number first, ties by creation order.
pub async fn list_active_rules(
    db: &Database,
    platform: Platform,
) -> Result<Vec<AutomationRule>, BridgeError> {
    db.connection()
        .call(move |conn| -> Result<Vec<AutomationRule>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RULE_COLUMNS} FROM automation_rules
                 WHERE active = 1
                   AND json_valid(platforms)
                   AND (json_array_length(platforms) = 0
                        OR EXISTS (SELECT 1 FROM json_each(automation_rules.platforms)
                                   WHERE value = ?1))
                 ORDER BY priority, id"
            ))?;
            let rows = stmt.query_map(params![platform.to_string()], rule_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set_rule_active(db: &Database, id: i64, active: bool) -> Result<(), BridgeError> {
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE automation_rules SET active = ?2 WHERE id = ?1",
                params![id, active],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(BridgeError::not_found("rule", id.to_string()));
    }
    Ok(())
}
