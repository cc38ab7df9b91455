// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for Bridgedesk.
//!
//! Settings are merged from compiled defaults, the XDG file hierarchy and
//! `BRIDGEDESK_*` variables, rejected on unknown keys, then checked as a
//! whole (account ids, active slots, non-zero capacities). Every problem is
//! reported at once as a [`ConfigError`] list.
//!
//! ```no_run
//! match bridgedesk_config::load_and_validate() {
//!     Ok(config) => println!("{} accounts configured", config.accounts.len()),
//!     Err(errors) => bridgedesk_config::render_errors(&errors),
//! }
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::{Path, PathBuf};

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::BridgedeskConfig;

/// Loads from the XDG hierarchy and validates.
pub fn load_and_validate() -> Result<BridgedeskConfig, Vec<ConfigError>> {
    checked(loader::load_config(), || read_sources(default_paths()))
}

/// Loads one file (plus env overrides) and validates.
pub fn load_and_validate_path(path: &Path) -> Result<BridgedeskConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_path(path), || {
        read_sources(vec![path.to_path_buf()])
    })
}

/// Loads an inline TOML document (no files, no env) and validates.
pub fn load_and_validate_str(toml_content: &str) -> Result<BridgedeskConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

/// Runs validation on a loaded config, or turns the load failure into
/// diagnostics. Sources are only read when there is something to point at.
fn checked(
    loaded: Result<BridgedeskConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<BridgedeskConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources())),
    }
}

/// The files [`load_config`] merges, most specific first.
fn default_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        std::env::current_dir()
            .map(|dir| dir.join("bridgedesk.toml"))
            .unwrap_or_else(|_| PathBuf::from("bridgedesk.toml")),
    ];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("bridgedesk").join("bridgedesk.toml"));
    }
    paths.push(PathBuf::from("/etc/bridgedesk/bridgedesk.toml"));
    paths
}

/// `(path, content)` for each readable file; missing files are skipped.
fn read_sources(paths: Vec<PathBuf>) -> Vec<(String, String)> {
    paths
        .into_iter()
        .filter_map(|path| {
            let content = std::fs::read_to_string(&path).ok()?;
            Some((path.display().to_string(), content))
        })
        .collect()
}
