// ABOUTME: Cycle-level error types surfaced by the retry policy, stores, and orchestrator
// ABOUTME: Maps the transient/validation/auth-expired/sync-failure taxonomy onto one enum
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::provider::ProviderError;
use crate::models::Source;

/// Result alias for engine operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Flat error classification attached to every error log line
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network timeout, 5xx or 429 (only seen while retries remain)
    Transient,
    /// Malformed or out-of-range measurement
    Validation,
    /// Token refresh failed; provider unusable until re-authentication
    AuthExpired,
    /// Retry budget exhausted
    SyncFailure,
    /// Non-transient provider error (4xx, unparseable payload)
    Provider,
    /// Local state store failure
    Storage,
    /// Invalid or missing configuration
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Transient => "transient",
            Self::Validation => "validation",
            Self::AuthExpired => "auth_expired",
            Self::SyncFailure => "sync_failure",
            Self::Provider => "provider",
            Self::Storage => "storage",
            Self::Config => "config",
        };
        f.write_str(name)
    }
}

/// A vendor record rejected at the adapter boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Vendor the record came from
    pub source: Source,
    /// Vendor id, when the record had one
    pub external_id: Option<String>,
    /// Violated rule
    pub reason: String,
}

impl ValidationError {
    /// Create a validation error
    #[must_use]
    pub fn new(source: Source, external_id: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            source,
            external_id,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid {} record {}: {}",
            self.source,
            self.external_id.as_deref().unwrap_or("<no id>"),
            self.reason
        )
    }
}

// `source` names the vendor here, so the derive would misread it as an error cause
impl std::error::Error for ValidationError {}

/// Errors surfaced to the orchestrator
#[derive(Debug, Error)]
pub enum SyncError {
    /// Token could not be refreshed; fatal for the provider this cycle
    #[error("authorization expired for {provider}: {reason}")]
    AuthExpired {
        /// Provider whose token is unusable
        provider: String,
        /// Why the refresh failed
        reason: String,
    },

    /// Measurement rejected by validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Transient failure that persisted through every attempt
    #[error("{operation} failed after {attempts} attempts: {source}")]
    SyncFailure {
        /// Operation label (e.g. `withings.getmeas`)
        operation: String,
        /// Attempts made
        attempts: u32,
        /// Last underlying error
        #[source]
        source: ProviderError,
    },

    /// Non-transient provider error propagated without retry
    #[error(transparent)]
    Provider(ProviderError),

    /// Local state store failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Create a storage error
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Classification for structured logging
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthExpired { .. } => ErrorKind::AuthExpired,
            Self::Validation(_) => ErrorKind::Validation,
            Self::SyncFailure { .. } => ErrorKind::SyncFailure,
            Self::Provider(_) => ErrorKind::Provider,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether this error makes the provider unusable for the rest of the cycle
    #[must_use]
    pub const fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthExpired { .. })
    }
}

impl From<ProviderError> for SyncError {
    /// Convert a provider error that will not be retried
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::AuthExpired { provider, reason } => Self::AuthExpired { provider, reason },
            other => Self::Provider(other),
        }
    }
}
