// ABOUTME: Per-provider sliding-window rate limiter for outbound API calls
// ABOUTME: Suspends callers until a slot frees up; never rejects or drops a call
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use health_sync_core::constants::defaults;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Ceiling of calls per rolling window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Calls admitted per window (at least one)
    pub max_calls: u32,
    /// Rolling window length
    pub window: Duration,
}

impl RateLimitConfig {
    /// Create a config; a zero ceiling is raised to one call
    #[must_use]
    pub fn new(max_calls: u32, window: Duration) -> Self {
        Self {
            max_calls: max_calls.max(1),
            window,
        }
    }

    /// `calls` per minute
    #[must_use]
    pub fn per_minute(calls: u32) -> Self {
        Self::new(calls, Duration::from_secs(60))
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(
            defaults::RATE_LIMIT_CALLS_PER_WINDOW,
            Duration::from_secs(defaults::RATE_LIMIT_WINDOW_SECS),
        )
    }
}

/// Admission log for one key
#[derive(Debug)]
struct SlidingWindow {
    config: RateLimitConfig,
    admitted: VecDeque<Instant>,
}

impl SlidingWindow {
    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.admitted.front() {
            if now.duration_since(*oldest) >= self.config.window {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
    }

    /// Time until the oldest admission leaves the window, or `None` if a slot is free
    fn wait_needed(&self, now: Instant) -> Option<Duration> {
        if self.admitted.len() < self.config.max_calls as usize {
            return None;
        }
        self.admitted
            .front()
            .map(|oldest| (*oldest + self.config.window).saturating_duration_since(now))
    }
}

/// Keyed rate limiter
///
/// Each key owns a sliding-window log behind its own async mutex. A caller
/// holds that mutex while it waits, so waiters on one key are admitted one
/// at a time in arrival order and can never burst past the ceiling when the
/// window rolls over. Keys never block each other.
#[derive(Debug)]
pub struct RateLimiter {
    default_config: RateLimitConfig,
    overrides: HashMap<String, RateLimitConfig>,
    windows: DashMap<String, Arc<Mutex<SlidingWindow>>>,
}

impl RateLimiter {
    /// Limiter applying `default_config` to every key
    #[must_use]
    pub fn new(default_config: RateLimitConfig) -> Self {
        Self {
            default_config,
            overrides: HashMap::new(),
            windows: DashMap::new(),
        }
    }

    /// Use a dedicated ceiling for `key`
    #[must_use]
    pub fn with_limit(mut self, key: impl Into<String>, config: RateLimitConfig) -> Self {
        self.overrides.insert(key.into(), config);
        self
    }

    /// Ceiling applied to `key`
    #[must_use]
    pub fn config_for(&self, key: &str) -> RateLimitConfig {
        self.overrides
            .get(key)
            .copied()
            .unwrap_or(self.default_config)
    }

    /// Wait until a call against `key` is allowed, then claim the slot
    ///
    /// Returns how long the caller was suspended.
    pub async fn acquire(&self, key: &str) -> Duration {
        let window = self.window(key);
        let started = Instant::now();
        let mut log = window.lock().await;

        loop {
            let now = Instant::now();
            log.prune(now);
            match log.wait_needed(now) {
                None => {
                    log.admitted.push_back(now);
                    break;
                }
                Some(wait) => {
                    debug!(
                        key,
                        wait_ms = wait.as_millis() as u64,
                        ceiling = log.config.max_calls,
                        "rate limit reached, waiting for a slot"
                    );
                    sleep(wait).await;
                }
            }
        }

        started.elapsed()
    }

    /// Calls admitted for `key` within the current window
    pub async fn in_flight_window(&self, key: &str) -> usize {
        let window = self.window(key);
        let mut log = window.lock().await;
        log.prune(Instant::now());
        log.admitted.len()
    }

    fn window(&self, key: &str) -> Arc<Mutex<SlidingWindow>> {
        if let Some(existing) = self.windows.get(key) {
            return Arc::clone(existing.value());
        }
        let config = self.config_for(key);
        Arc::clone(
            self.windows
                .entry(key.to_owned())
                .or_insert_with(|| {
                    Arc::new(Mutex::new(SlidingWindow {
                        config,
                        admitted: VecDeque::with_capacity(config.max_calls as usize),
                    }))
                })
                .value(),
        )
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
