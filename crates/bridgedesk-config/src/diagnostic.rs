// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics.
//!
//! Figment errors and validation failures become [`ConfigError`]s that
//! miette renders with the offending TOML line highlighted and, for unknown
//! keys, the closest valid key by Jaro-Winkler similarity.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Similarity a valid key needs before it is offered as a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration problem, ready for miette rendering.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("`{key}` is not a bridgedesk setting")]
    #[diagnostic(
        code(bridgedesk::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        /// Closest valid key, if one is similar enough.
        suggestion: Option<String>,
        /// Comma-separated keys accepted in the same table.
        valid_keys: String,
        #[label("unknown key")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: {detail}")]
    #[diagnostic(code(bridgedesk::config::invalid_type), help("use {expected}"))]
    InvalidType {
        /// Dotted path, e.g. `gateway.port`.
        key: String,
        detail: String,
        expected: String,
        #[label("expected {expected}")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` is required")]
    #[diagnostic(
        code(bridgedesk::config::missing_key),
        help("every [[accounts]] entry needs `id`, `platform` and `kind`")
    )]
    MissingKey { key: String },

    /// A value that parsed but makes no sense, e.g. a zero queue capacity.
    #[error("invalid value for `{field}`: {message}")]
    #[diagnostic(code(bridgedesk::config::validation))]
    Validation {
        /// Dotted path of the offending key, e.g. `accounts[1].kind`.
        field: String,
        message: String,
    },

    #[error("{count} accounts are marked active for {platform}: {accounts}")]
    #[diagnostic(
        code(bridgedesk::config::duplicate_active),
        help("set `active = true` on exactly one [[accounts]] entry per platform")
    )]
    DuplicateActive {
        platform: String,
        count: usize,
        accounts: String,
    },

    #[error("configuration error: {0}")]
    #[diagnostic(code(bridgedesk::config::other))]
    Other(String),
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Converts every error inside a figment failure into a [`ConfigError`].
///
/// `toml_sources` holds `(path, content)` pairs of the files that were
/// merged; errors that originate in one of them get a source span.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| match &error.kind {
            Kind::UnknownField(field, expected) => {
                let (span, src) = locate(&error, &table_path(&error), field, toml_sources);
                ConfigError::UnknownKey {
                    key: field.clone(),
                    suggestion: suggest_key(field, expected),
                    valid_keys: expected.join(", "),
                    span,
                    src,
                }
            }
            Kind::MissingField(field) => ConfigError::MissingKey {
                key: join_key(&table_path(&error), field),
            },
            Kind::InvalidType(actual, expected) => {
                // The error path ends with the key itself.
                let mut table = table_path(&error);
                let field = table.pop().unwrap_or_default();
                let (span, src) = locate(&error, &table, &field, toml_sources);
                ConfigError::InvalidType {
                    key: join_key(&table, &field),
                    detail: format!("found {actual}"),
                    expected: expected.to_string(),
                    span,
                    src,
                }
            }
            _ => ConfigError::Other(error.to_string()),
        })
        .collect()
}

fn table_path(error: &figment::Error) -> Vec<String> {
    error.path.iter().map(ToString::to_string).collect()
}

fn join_key(table: &[String], field: &str) -> String {
    if table.is_empty() {
        field.to_string()
    } else {
        format!("{}.{field}", table.join("."))
    }
}

/// Span and source for `field` under `table`, when the error came from a
/// file we have the contents of.
fn locate(
    error: &figment::Error,
    table: &[String],
    field: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let Some(figment::Source::File(file)) = error.metadata.as_ref().and_then(|m| m.source.as_ref())
    else {
        return (None, None);
    };
    let file = file.display().to_string();
    let Some((name, content)) = toml_sources.iter().find(|(path, _)| *path == file) else {
        return (None, None);
    };
    match find_key_offset(content, table, field) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), field.len())),
            Some(NamedSource::new(name, content.clone())),
        ),
        None => (None, None),
    }
}

/// Byte offset of `field` as a key inside the table named by `path[0]`.
///
/// Both `[table]` and `[[table]]` headers are recognized; for an
/// array-of-tables the first entry containing the key wins. An empty path
/// searches the whole document.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let start = match path.first() {
        None => 0,
        Some(table) => {
            let array = format!("[[{table}]]");
            let plain = format!("[{table}]");
            content
                .find(&array)
                .map(|pos| pos + array.len())
                .or_else(|| content.find(&plain).map(|pos| pos + plain.len()))?
        }
    };

    let mut offset = start;
    for line in content[start..].split_inclusive('\n') {
        let key = line.trim_start();
        let indent = line.len() - key.len();
        if let Some(rest) = key.strip_prefix(field) {
            if rest.trim_start().starts_with('=') {
                return Some(offset + indent);
            }
        }
        offset += line.len();
    }
    None
}

/// The valid key most similar to `unknown`, if any clears the threshold.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Prints each error to stderr through miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut report = String::new();
        match handler.render_report(&mut report, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{report}"),
            Err(_) => eprintln!("error: {error}"),
        }
    }
}
