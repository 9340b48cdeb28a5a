// ABOUTME: Bounded exponential backoff wrapped around a single outbound operation
// ABOUTME: Retries transient provider errors, honours Retry-After, and reports exhaustion as SyncFailure
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::future::Future;
use std::time::Duration;

use health_sync_core::constants::defaults;
use health_sync_core::{ErrorKind, ProviderResult, SyncError, SyncResult};
use rand::Rng;
use tracing::{debug, error, warn};

/// Backoff contract for one class of operations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryBackoffConfig {
    /// Total attempts including the first (at least one)
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each further attempt
    pub base_delay: Duration,
    /// Ceiling for any single delay, including `Retry-After` hints
    pub max_delay: Duration,
    /// Random spread applied to computed delays, as a fraction (0.0 disables)
    pub jitter_factor: f64,
}

impl RetryBackoffConfig {
    /// Config with the given attempts and base delay, default ceiling, and no jitter
    #[must_use]
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay: Duration::from_millis(defaults::RETRY_MAX_DELAY_MS),
            jitter_factor: 0.0,
        }
    }

    /// Override the delay ceiling
    #[must_use]
    pub const fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Override the jitter factor (clamped to 0.0..=1.0)
    #[must_use]
    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    ///
    /// A provider hint replaces the exponential curve for that attempt and is
    /// not jittered. Both are capped at `max_delay`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        if let Some(hint) = hint {
            return hint.min(self.max_delay);
        }

        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        let exponential = self.base_delay.saturating_mul(factor).min(self.max_delay);
        if self.jitter_factor <= 0.0 {
            return exponential;
        }

        let spread = rand::thread_rng().gen_range(-self.jitter_factor..=self.jitter_factor);
        exponential.mul_f64(1.0 + spread).min(self.max_delay)
    }
}

impl Default for RetryBackoffConfig {
    fn default() -> Self {
        Self::new(
            defaults::RETRY_MAX_ATTEMPTS,
            Duration::from_millis(defaults::RETRY_BASE_DELAY_MS),
        )
        .with_jitter(defaults::RETRY_JITTER_FACTOR)
    }
}

/// Run `call` under `config`, retrying transient failures
///
/// `call` is invoked once per attempt and must rebuild its request each time.
/// Non-retryable errors return immediately through `From<ProviderError>`
/// (so an expired authorization surfaces as `SyncError::AuthExpired`). When
/// every attempt fails transiently the last error is wrapped in
/// `SyncError::SyncFailure`.
///
/// # Errors
///
/// Returns the first non-retryable error, or `SyncFailure` once
/// `max_attempts` transient failures have occurred.
pub async fn with_retry<T, F, Fut>(
    config: &RetryBackoffConfig,
    operation: &str,
    mut call: F,
) -> SyncResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match call().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if !e.is_retryable() => {
                let err = SyncError::from(e);
                debug!(operation, attempt, error_kind = %err.kind(), error = %err, "not retrying");
                return Err(err);
            }
            Err(e) if attempt >= max_attempts => {
                error!(
                    operation,
                    provider = e.provider(),
                    attempts = attempt,
                    error_kind = %ErrorKind::SyncFailure,
                    error = %e,
                    "retry budget exhausted"
                );
                return Err(SyncError::SyncFailure {
                    operation: operation.to_owned(),
                    attempts: attempt,
                    source: e,
                });
            }
            Err(e) => {
                let delay = config.delay_for(attempt, e.retry_after());
                warn!(
                    operation,
                    provider = e.provider(),
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error_kind = %ErrorKind::Transient,
                    error = %e,
                    "transient failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
