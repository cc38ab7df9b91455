// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Collects every problem instead of failing fast so an operator can fix a
//! config file in one pass.

use std::collections::{BTreeMap, HashSet};

use bridgedesk_core::types::Platform;

use crate::diagnostic::ConfigError;
use crate::model::BridgedeskConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        message: message.into(),
    }
}

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors.
pub fn validate_config(config: &BridgedeskConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.service.log_level.to_ascii_lowercase().as_str()) {
        errors.push(invalid(
            "service.log_level",
            format!(
                "`{}` is not one of {}",
                config.service.log_level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(invalid("storage.database_path", "must not be empty"));
    }

    let non_zero = [
        ("connection.reconnect_delay_secs", config.connection.reconnect_delay_secs),
        ("connection.start_timeout_secs", config.connection.start_timeout_secs),
        ("connection.stop_timeout_secs", config.connection.stop_timeout_secs),
        ("connection.command_buffer", config.connection.command_buffer as u64),
        ("connection.overflow_buffer", config.connection.overflow_buffer as u64),
        ("pipeline.ingest_queue_capacity", config.pipeline.ingest_queue_capacity as u64),
        (
            "pipeline.automation_queue_capacity",
            config.pipeline.automation_queue_capacity as u64,
        ),
        ("pipeline.automation_concurrency", config.pipeline.automation_concurrency as u64),
        ("dispatch.send_timeout_secs", config.dispatch.send_timeout_secs),
        ("dispatch.webhook_timeout_secs", config.dispatch.webhook_timeout_secs),
    ];
    for (field, value) in non_zero {
        if value == 0 {
            errors.push(invalid(field, "must be greater than zero"));
        }
    }

    let base = config.dispatch.graph_base_url.trim();
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        errors.push(invalid(
            "dispatch.graph_base_url",
            format!("`{base}` is not an http(s) URL"),
        ));
    }

    if config.gateway.enabled {
        let host = config.gateway.host.trim();
        let is_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_hostname = !host.is_empty()
            && host
                .chars()
                .all(|c| c.is_alphanumeric() || c == '.' || c == '-');
        if !is_ip && !is_hostname {
            errors.push(invalid(
                "gateway.host",
                format!("`{host}` is not a valid IP address or hostname"),
            ));
        }
    }

    validate_accounts(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_accounts(config: &BridgedeskConfig, errors: &mut Vec<ConfigError>) {
    let mut seen_ids = HashSet::new();
    let mut active: BTreeMap<Platform, Vec<&str>> = BTreeMap::new();

    for (i, account) in config.accounts.iter().enumerate() {
        if account.id.trim().is_empty() {
            errors.push(invalid(format!("accounts[{i}].id"), "must not be empty"));
        } else if !seen_ids.insert(account.id.as_str()) {
            errors.push(invalid(
                format!("accounts[{i}].id"),
                format!("duplicate account id `{}`", account.id),
            ));
        }

        if !account.kind.supports(account.platform) {
            errors.push(invalid(
                format!("accounts[{i}].kind"),
                format!(
                    "{} accounts cannot serve {}",
                    account.kind, account.platform
                ),
            ));
        }

        if account.active {
            active
                .entry(account.platform)
                .or_default()
                .push(account.id.as_str());
        }
    }

    for (platform, ids) in active {
        if ids.len() > 1 {
            errors.push(ConfigError::DuplicateActive {
                platform: platform.to_string(),
                count: ids.len(),
                accounts: ids.join(", "),
            });
        }
    }
}
