// ABOUTME: Device adapter contract and the guarded call path shared by every adapter
// ABOUTME: Each vendor call gets a fresh token, a rate-limit slot, and the retry policy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use health_sync_core::{
    ErrorKind, Measurement, Provider, ProviderResult, Source, SyncResult, ValidationError,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::rate_limiter::RateLimiter;
use crate::retry::{with_retry, RetryBackoffConfig};
use crate::token_source::TokenSource;
use crate::transport::VendorTransport;

/// Measurements produced by one `fetch_since` call
#[derive(Debug, Clone, PartialEq)]
pub struct FetchBatch {
    /// Adapter that produced the batch
    pub source: Source,
    /// Valid measurements in fetch order
    pub measurements: Vec<Measurement>,
    /// Records dropped at the boundary
    pub rejected: Vec<ValidationError>,
}

impl FetchBatch {
    /// Empty batch for `source`
    #[must_use]
    pub const fn new(source: Source) -> Self {
        Self {
            source,
            measurements: Vec::new(),
            rejected: Vec::new(),
        }
    }

    /// Keep `measurement` if it validates, otherwise log and count it as rejected
    ///
    /// A measurement whose external id is already in the batch is ignored;
    /// overlapping vendor query windows return the same record twice.
    pub fn accept(&mut self, measurement: Measurement) {
        if self
            .measurements
            .iter()
            .any(|m| m.external_id == measurement.external_id)
        {
            debug!(external_id = %measurement.external_id, "duplicate record in batch");
            return;
        }
        match measurement.validate() {
            Ok(()) => self.measurements.push(measurement),
            Err(e) => self.reject(e),
        }
    }

    /// Record a vendor record that could not be mapped
    pub fn reject(&mut self, error: ValidationError) {
        warn!(
            provider = %error.source,
            external_id = error.external_id.as_deref().unwrap_or(""),
            error_kind = %ErrorKind::Validation,
            reason = %error.reason,
            "dropping invalid vendor record"
        );
        self.rejected.push(error);
    }

    /// Order measurements chronologically, keeping vendor order for ties
    pub fn sort_chronologically(&mut self) {
        self.measurements.sort_by_key(|m| m.timestamp_start);
    }
}

/// A vendor integration producing canonical measurements
#[async_trait]
pub trait DeviceAdapter: Send + Sync {
    /// Vendor this adapter reads from
    fn source(&self) -> Source;

    /// Fetch every measurement recorded or uploaded at or after `since`
    ///
    /// Adapters may also return older measurements from a trailing re-scan
    /// window; the ledger filters the ones already synced.
    ///
    /// # Errors
    ///
    /// `SyncError::AuthExpired` when the vendor token cannot be refreshed,
    /// `SyncError::SyncFailure` when a vendor call keeps failing transiently,
    /// and `SyncError::Provider` for non-transient vendor errors. Invalid
    /// records are never errors; they land in `FetchBatch::rejected`.
    async fn fetch_since(&self, since: DateTime<Utc>) -> SyncResult<FetchBatch>;
}

/// Collaborators every vendor call goes through
#[derive(Clone)]
pub struct AdapterContext {
    /// Valid-token accessor
    pub tokens: Arc<dyn TokenSource>,
    /// Shared keyed rate limiter
    pub limiter: Arc<RateLimiter>,
    /// Backoff contract for vendor calls
    pub retry: RetryBackoffConfig,
    /// HTTP transport
    pub transport: Arc<dyn VendorTransport>,
}

impl AdapterContext {
    /// Bundle the collaborators
    #[must_use]
    pub fn new(
        tokens: Arc<dyn TokenSource>,
        limiter: Arc<RateLimiter>,
        retry: RetryBackoffConfig,
        transport: Arc<dyn VendorTransport>,
    ) -> Self {
        Self {
            tokens,
            limiter,
            retry,
            transport,
        }
    }

    /// Authenticated, rate-limited, retried `GET`
    ///
    /// # Errors
    ///
    /// See [`with_retry`].
    pub async fn get_json(
        &self,
        provider: Provider,
        operation: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> SyncResult<Value> {
        let tokens = &self.tokens;
        let limiter = &self.limiter;
        let transport = &self.transport;
        with_retry(&self.retry, operation, move || async move {
            let token = tokens.get_valid_token(provider).await?;
            limiter.acquire(provider.as_str()).await;
            transport
                .get_json(provider.as_str(), url, &token.access_token, query)
                .await
        })
        .await
    }

    /// Authenticated, rate-limited, retried form `POST`
    ///
    /// `decode` runs inside each attempt so vendor-level status codes carried
    /// in a 200 response (e.g. a throttling code) are classified like HTTP ones.
    ///
    /// # Errors
    ///
    /// See [`with_retry`].
    pub async fn post_form<T, D>(
        &self,
        provider: Provider,
        operation: &str,
        url: &str,
        form: &[(&str, String)],
        decode: D,
    ) -> SyncResult<T>
    where
        D: Fn(Value) -> ProviderResult<T> + Send + Sync,
        T: Send,
    {
        let tokens = &self.tokens;
        let limiter = &self.limiter;
        let transport = &self.transport;
        let decode = &decode;
        with_retry(&self.retry, operation, move || async move {
            let token = tokens.get_valid_token(provider).await?;
            limiter.acquire(provider.as_str()).await;
            transport
                .post_form(provider.as_str(), url, Some(&token.access_token), form)
                .await
                .and_then(decode)
        })
        .await
    }

    /// Authenticated, rate-limited, retried JSON `POST`
    ///
    /// # Errors
    ///
    /// See [`with_retry`].
    pub async fn post_json(
        &self,
        provider: Provider,
        operation: &str,
        url: &str,
        body: &Value,
    ) -> SyncResult<Value> {
        let tokens = &self.tokens;
        let limiter = &self.limiter;
        let transport = &self.transport;
        with_retry(&self.retry, operation, move || async move {
            let token = tokens.get_valid_token(provider).await?;
            limiter.acquire(provider.as_str()).await;
            transport
                .post_json(provider.as_str(), url, &token.access_token, body)
                .await
        })
        .await
    }
}

/// Round a vendor-reported float into `u16`, saturating at the type bounds
///
/// Out-of-range readings saturate and are then rejected by validation.
pub(crate) fn saturating_u16(value: f64) -> u16 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, f64::from(u16::MAX)) as u16
}
