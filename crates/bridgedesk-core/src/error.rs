// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for Bridgedesk.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across all Bridgedesk traits and core operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No principal, or the principal could not be verified.
    #[error("authentication required: {0}")]
    Authentication(String),

    /// The principal's role does not allow the requested mutation.
    #[error("permission denied: {0}")]
    Permission(String),

    /// A referenced conversation, account, rule or contact does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Malformed input (address, trigger parameter, payload).
    #[error("validation error: {0}")]
    Validation(String),

    /// Platform or network failure that may succeed on retry.
    #[error("transient I/O error: {message}")]
    TransientIo {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A bounded external call exceeded its deadline.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Storage read or write failed.
    #[error("persistence error: {source}")]
    Persistence {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// No active account for a platform, or incomplete credentials.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Shorthand for a [`BridgeError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Shorthand for a [`BridgeError::TransientIo`] without an underlying source.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientIo {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps a storage-layer error.
    pub fn persistence<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Persistence {
            source: Box::new(err),
        }
    }

    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientIo { .. } | Self::Timeout { .. })
    }

    /// Stable snake_case name of the error category, used in results and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "authentication",
            Self::Permission(_) => "permission",
            Self::NotFound { .. } => "not_found",
            Self::Validation(_) => "validation",
            Self::TransientIo { .. } => "transient_io",
            Self::Timeout { .. } => "timeout",
            Self::Persistence { .. } => "persistence",
            Self::Configuration(_) => "configuration",
            Self::Internal(_) => "internal",
        }
    }
}
