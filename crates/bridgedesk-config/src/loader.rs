// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./bridgedesk.toml` > `~/.config/bridgedesk/bridgedesk.toml` >
//! `/etc/bridgedesk/bridgedesk.toml` with environment variable overrides via `BRIDGEDESK_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::BridgedeskConfig;

/// Sections whose keys may be overridden from the environment.
const ENV_SECTIONS: &[&str] = &[
    "service",
    "storage",
    "connection",
    "pipeline",
    "dispatch",
    "gateway",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/bridgedesk/bridgedesk.toml` (system-wide)
/// 3. `~/.config/bridgedesk/bridgedesk.toml` (user XDG config)
/// 4. `./bridgedesk.toml` (local directory)
/// 5. `BRIDGEDESK_*` environment variables
pub fn load_config() -> Result<BridgedeskConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<BridgedeskConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BridgedeskConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<BridgedeskConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BridgedeskConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(BridgedeskConfig::default()))
        .merge(Toml::file("/etc/bridgedesk/bridgedesk.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("bridgedesk/bridgedesk.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("bridgedesk.toml"))
        .merge(env_provider())
}

/// Environment provider with an explicit section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")`: `BRIDGEDESK_PIPELINE_AUTOMATION_CONCURRENCY`
/// must map to `pipeline.automation_concurrency`, not `pipeline.automation.concurrency`.
fn env_provider() -> Env {
    Env::prefixed("BRIDGEDESK_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
