// ABOUTME: Tests for the keyed rate limiter and the retry policy
// ABOUTME: Uses paused tokio time so window and backoff timing are exact
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use health_sync_core::{ErrorKind, ProviderError, SyncError};
use health_sync_providers::{with_retry, RateLimitConfig, RateLimiter, RetryBackoffConfig};
use tokio::time::Instant;

// ============================================================================
// Rate limiter
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_thirty_calls_per_minute_ceiling_holds_under_concurrency() {
    common::init_test_logging();
    let limiter = Arc::new(RateLimiter::new(RateLimitConfig::per_minute(30)));
    let admitted = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for _ in 0..3 {
        let limiter = Arc::clone(&limiter);
        let admitted = Arc::clone(&admitted);
        handles.push(tokio::spawn(async move {
            for _ in 0..30 {
                limiter.acquire("withings").await;
                admitted.lock().unwrap().push(Instant::now());
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let mut times = admitted.lock().unwrap().clone();
    times.sort();
    assert_eq!(times.len(), 90);
    for i in 0..times.len() - 30 {
        assert!(
            times[i + 30].duration_since(times[i]) >= Duration::from_secs(60),
            "calls {i} and {} fell inside one window",
            i + 30
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_call_over_ceiling_waits_for_window() {
    let limiter = RateLimiter::new(RateLimitConfig::new(2, Duration::from_secs(10)));

    assert_eq!(limiter.acquire("omron").await, Duration::ZERO);
    assert_eq!(limiter.acquire("omron").await, Duration::ZERO);
    assert_eq!(limiter.in_flight_window("omron").await, 2);

    let waited = limiter.acquire("omron").await;
    assert_eq!(waited, Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_keys_do_not_share_budget() {
    let limiter = RateLimiter::new(RateLimitConfig::new(1, Duration::from_secs(60)));

    limiter.acquire("withings").await;
    let start = Instant::now();
    limiter.acquire("calendar").await;

    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(limiter.in_flight_window("withings").await, 1);
    assert_eq!(limiter.in_flight_window("calendar").await, 1);
}

#[test]
fn test_per_key_override() {
    let limiter = RateLimiter::default().with_limit("calendar", RateLimitConfig::per_minute(5));

    assert_eq!(limiter.config_for("calendar").max_calls, 5);
    assert_eq!(limiter.config_for("omron").max_calls, 30);
    assert_eq!(limiter.config_for("omron").window, Duration::from_secs(60));
}

// ============================================================================
// Retry policy
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_persistent_transient_failure_exhausts_budget() {
    let config = RetryBackoffConfig::new(3, Duration::from_secs(1));
    let counter = AtomicU32::new(0);
    let attempts = &counter;
    let start = Instant::now();

    let result: Result<(), _> = with_retry(&config, "withings.getmeas", move || async move {
        attempts.fetch_add(1, Ordering::SeqCst);
        Err(ProviderError::network("withings", "connection reset"))
    })
    .await;

    assert_eq!(counter.load(Ordering::SeqCst), 3);
    // 1s after the first failure, 2s after the second, none after the last
    assert_eq!(start.elapsed(), Duration::from_secs(3));
    match result.unwrap_err() {
        SyncError::SyncFailure {
            operation,
            attempts,
            source,
        } => {
            assert_eq!(operation, "withings.getmeas");
            assert_eq!(attempts, 3);
            assert!(matches!(source, ProviderError::Network { .. }));
        }
        other => panic!("expected SyncFailure, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_non_transient_error_is_not_retried() {
    let config = RetryBackoffConfig::new(5, Duration::from_secs(1));
    let counter = AtomicU32::new(0);
    let attempts = &counter;

    let result: Result<(), _> = with_retry(&config, "omron.readings", move || async move {
        attempts.fetch_add(1, Ordering::SeqCst);
        Err(ProviderError::api("omron", 400, "bad request"))
    })
    .await;

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Provider);
}

#[tokio::test(start_paused = true)]
async fn test_auth_expired_surfaces_immediately() {
    let config = RetryBackoffConfig::default();
    let counter = AtomicU32::new(0);
    let attempts = &counter;

    let result: Result<(), _> = with_retry(&config, "calendar.insert", move || async move {
        attempts.fetch_add(1, Ordering::SeqCst);
        Err(ProviderError::auth_expired("calendar", "refresh rejected"))
    })
    .await;

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(result.unwrap_err().is_auth_expired());
}

#[tokio::test(start_paused = true)]
async fn test_recovers_within_budget() {
    let config = RetryBackoffConfig::new(3, Duration::from_millis(100));
    let counter = AtomicU32::new(0);
    let attempts = &counter;

    let result = with_retry(&config, "omron.readings", move || async move {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt < 3 {
            Err(ProviderError::api("omron", 503, "unavailable"))
        } else {
            Ok(attempt)
        }
    })
    .await;

    assert_eq!(result.unwrap(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_hint_replaces_backoff() {
    let config = RetryBackoffConfig::new(2, Duration::from_millis(10));
    let counter = AtomicU32::new(0);
    let attempts = &counter;
    let start = Instant::now();

    let result = with_retry(&config, "withings.getmeas", move || async move {
        if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(ProviderError::rate_limited("withings", Some(5)))
        } else {
            Ok(())
        }
    })
    .await;

    assert!(result.is_ok());
    assert_eq!(start.elapsed(), Duration::from_secs(5));
}

#[test]
fn test_delay_curve_is_exponential_and_capped() {
    let config = RetryBackoffConfig::new(10, Duration::from_millis(500))
        .with_max_delay(Duration::from_secs(3));

    assert_eq!(config.delay_for(1, None), Duration::from_millis(500));
    assert_eq!(config.delay_for(2, None), Duration::from_secs(1));
    assert_eq!(config.delay_for(3, None), Duration::from_secs(2));
    assert_eq!(config.delay_for(4, None), Duration::from_secs(3));
    assert_eq!(config.delay_for(9, None), Duration::from_secs(3));
    assert_eq!(
        config.delay_for(1, Some(Duration::from_secs(60))),
        Duration::from_secs(3)
    );
}

#[test]
fn test_jitter_stays_within_factor() {
    let config = RetryBackoffConfig::new(3, Duration::from_secs(1)).with_jitter(0.1);

    for _ in 0..50 {
        let delay = config.delay_for(1, None);
        assert!(delay >= Duration::from_millis(900), "{delay:?}");
        assert!(delay <= Duration::from_millis(1100), "{delay:?}");
    }
}
