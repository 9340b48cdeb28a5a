// ABOUTME: Structured error types for vendor, token endpoint, and calendar API calls
// ABOUTME: Carries retry classification and rate limit hints used by the retry policy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::time::Duration;

use thiserror::Error;

/// Result alias for provider calls
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors raised by a single outbound call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Connection failure, timeout, or other transport error
    #[error("{provider} network error: {message}")]
    Network {
        /// Provider that was being called
        provider: String,
        /// Transport error description
        message: String,
    },

    /// Non-success HTTP status (or vendor status code)
    #[error("{provider} API error ({status_code}): {message}")]
    ApiError {
        /// Provider that was being called
        provider: String,
        /// HTTP or vendor status code
        status_code: u16,
        /// Response body or vendor message
        message: String,
        /// Whether a retry can succeed (server-side errors)
        retryable: bool,
    },

    /// Provider throttled the call (HTTP 429 or vendor equivalent)
    #[error("{provider} rate limit exceeded")]
    RateLimitExceeded {
        /// Provider that throttled the call
        provider: String,
        /// `Retry-After` hint, if the provider sent one
        retry_after_secs: Option<u64>,
    },

    /// Access token rejected by the API
    #[error("{provider} rejected credentials: {reason}")]
    AuthenticationFailed {
        /// Provider that rejected the call
        provider: String,
        /// Rejection reason
        reason: String,
    },

    /// No usable token could be obtained; requires out-of-band re-authentication
    #[error("{provider} authorization expired: {reason}")]
    AuthExpired {
        /// Provider whose token is unusable
        provider: String,
        /// Why the token could not be refreshed
        reason: String,
    },

    /// Response could not be parsed into the expected shape
    #[error("{provider} returned an invalid response: {message}")]
    InvalidResponse {
        /// Provider that sent the response
        provider: String,
        /// Parse failure description
        message: String,
    },
}

impl ProviderError {
    /// Create a network error
    #[must_use]
    pub fn network(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an API error from a status code; 5xx responses are retryable
    #[must_use]
    pub fn api(provider: impl Into<String>, status_code: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            provider: provider.into(),
            status_code,
            message: message.into(),
            retryable: (500..600).contains(&status_code),
        }
    }

    /// Create a rate limit error
    #[must_use]
    pub fn rate_limited(provider: impl Into<String>, retry_after_secs: Option<u64>) -> Self {
        Self::RateLimitExceeded {
            provider: provider.into(),
            retry_after_secs,
        }
    }

    /// Create an authentication failure
    #[must_use]
    pub fn auth_failed(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Create an expired-authorization error
    #[must_use]
    pub fn auth_expired(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AuthExpired {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid-response error
    #[must_use]
    pub fn invalid_response(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the same call can succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::RateLimitExceeded { .. } => true,
            Self::ApiError { retryable, .. } => *retryable,
            Self::AuthenticationFailed { .. }
            | Self::AuthExpired { .. }
            | Self::InvalidResponse { .. } => false,
        }
    }

    /// Delay requested by the provider before the next attempt
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimitExceeded {
                retry_after_secs: Some(secs),
                ..
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }

    /// Provider the error came from
    #[must_use]
    pub fn provider(&self) -> &str {
        match self {
            Self::Network { provider, .. }
            | Self::ApiError { provider, .. }
            | Self::RateLimitExceeded { provider, .. }
            | Self::AuthenticationFailed { provider, .. }
            | Self::AuthExpired { provider, .. }
            | Self::InvalidResponse { provider, .. } => provider,
        }
    }
}
