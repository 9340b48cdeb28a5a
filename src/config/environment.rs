// ABOUTME: Environment configuration for credentials, endpoints, and engine tuning
// ABOUTME: Parses typed settings with defaults and reports every missing credential at once
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Environment-based configuration

use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use health_sync_core::constants::{defaults, endpoints, env_config};
use health_sync_core::Provider;
use health_sync_providers::http_client::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS,
};
use health_sync_providers::{HttpClientConfig, RateLimitConfig, RetryBackoffConfig};
use tracing::{debug, info};

/// `OAuth2` client registration for one provider
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthClientConfig {
    /// Client id
    pub client_id: String,
    /// Client secret
    pub client_secret: String,
    /// Token endpoint used for refresh
    pub token_url: String,
}

impl std::fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("token_url", &self.token_url)
            .finish()
    }
}

/// Complete daemon configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Withings `OAuth` client
    pub withings: OAuthClientConfig,
    /// Withings API base URL
    pub withings_api_base: String,
    /// Omron `OAuth` client
    pub omron: OAuthClientConfig,
    /// Omron API base URL
    pub omron_api_base: String,
    /// Google `OAuth` client
    pub google: OAuthClientConfig,
    /// Google Calendar API base URL
    pub calendar_api_base: String,
    /// Calendar receiving the events
    pub calendar_id: String,
    /// `SQLite` URL for sync state
    pub database_url: String,
    /// Period between sync cycles
    pub sync_interval: Duration,
    /// Calls per minute per provider
    pub rate_limit: RateLimitConfig,
    /// Backoff contract for every outbound call
    pub retry: RetryBackoffConfig,
    /// Tokens expiring within this margin are refreshed first
    pub token_safety_margin: chrono::Duration,
    /// Fetch window for an adapter without a checkpoint
    pub initial_lookback: chrono::Duration,
    /// Overlap subtracted from the checkpoint on each fetch
    pub checkpoint_overlap: chrono::Duration,
    /// Trailing history every adapter re-scans for late uploads
    pub rescan_window: chrono::Duration,
    /// HTTP client timeouts
    pub http: HttpClientConfig,
}

impl SyncConfig {
    /// Load configuration from the process environment
    ///
    /// `config/.env` and then `.env` are loaded first when present; variables
    /// already set in the environment win. Credentials are not checked here;
    /// call [`SyncConfig::validate`] before syncing.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric setting cannot be parsed
    pub fn from_env() -> Result<Self> {
        for path in ["config/.env", ".env"] {
            if Path::new(path).exists() {
                match dotenvy::from_filename(path) {
                    Ok(_) => debug!(path, "loaded environment file"),
                    Err(e) => return Err(e).with_context(|| format!("Failed to load {path}")),
                }
            }
        }
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric setting cannot be parsed
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |name: &str| lookup(name).map(|v| v.trim().to_owned()).unwrap_or_default();
        let text_or = |name: &str, default: &str| {
            lookup(name)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_owned())
        };

        let rate_limit_per_minute = parse_or(
            &lookup,
            env_config::RATE_LIMIT_PER_MINUTE,
            defaults::RATE_LIMIT_CALLS_PER_WINDOW,
        )?;
        let retry_max_attempts = parse_or(
            &lookup,
            env_config::RETRY_MAX_ATTEMPTS,
            defaults::RETRY_MAX_ATTEMPTS,
        )?;
        let retry_base_ms = parse_or(
            &lookup,
            env_config::RETRY_BASE_DELAY_MS,
            defaults::RETRY_BASE_DELAY_MS,
        )?;
        let retry_max_ms = parse_or(
            &lookup,
            env_config::RETRY_MAX_DELAY_MS,
            defaults::RETRY_MAX_DELAY_MS,
        )?;
        let jitter: f64 = parse_or(
            &lookup,
            env_config::RETRY_JITTER_FACTOR,
            defaults::RETRY_JITTER_FACTOR,
        )?;
        if !(0.0..=1.0).contains(&jitter) {
            return Err(anyhow!(
                "{} must be between 0.0 and 1.0, got {jitter}",
                env_config::RETRY_JITTER_FACTOR
            ));
        }

        let config = Self {
            withings: OAuthClientConfig {
                client_id: text(env_config::WITHINGS_CLIENT_ID),
                client_secret: text(env_config::WITHINGS_CLIENT_SECRET),
                token_url: text_or(env_config::WITHINGS_TOKEN_URL, endpoints::WITHINGS_TOKEN_URL),
            },
            withings_api_base: text_or(env_config::WITHINGS_API_BASE, endpoints::WITHINGS_API_BASE),
            omron: OAuthClientConfig {
                client_id: text(env_config::OMRON_CLIENT_ID),
                client_secret: text(env_config::OMRON_CLIENT_SECRET),
                token_url: text_or(env_config::OMRON_TOKEN_URL, endpoints::OMRON_TOKEN_URL),
            },
            omron_api_base: text_or(env_config::OMRON_API_BASE, endpoints::OMRON_API_BASE),
            google: OAuthClientConfig {
                client_id: text(env_config::GOOGLE_CLIENT_ID),
                client_secret: text(env_config::GOOGLE_CLIENT_SECRET),
                token_url: text_or(env_config::GOOGLE_TOKEN_URL, endpoints::GOOGLE_TOKEN_URL),
            },
            calendar_api_base: text_or(
                env_config::GOOGLE_CALENDAR_API_BASE,
                endpoints::GOOGLE_CALENDAR_API_BASE,
            ),
            calendar_id: text(env_config::GOOGLE_CALENDAR_ID),
            database_url: text_or(env_config::DATABASE_URL, defaults::DATABASE_URL),
            sync_interval: Duration::from_secs(parse_or(
                &lookup,
                env_config::SYNC_INTERVAL_SECS,
                defaults::SYNC_INTERVAL_SECS,
            )?),
            rate_limit: RateLimitConfig::per_minute(rate_limit_per_minute),
            retry: RetryBackoffConfig::new(retry_max_attempts, Duration::from_millis(retry_base_ms))
                .with_max_delay(Duration::from_millis(retry_max_ms))
                .with_jitter(jitter),
            token_safety_margin: chrono::Duration::seconds(parse_or(
                &lookup,
                env_config::TOKEN_SAFETY_MARGIN_SECS,
                defaults::TOKEN_SAFETY_MARGIN_SECS,
            )?),
            initial_lookback: chrono::Duration::hours(parse_or(
                &lookup,
                env_config::INITIAL_LOOKBACK_HOURS,
                defaults::INITIAL_LOOKBACK_HOURS,
            )?),
            checkpoint_overlap: chrono::Duration::minutes(parse_or(
                &lookup,
                env_config::CHECKPOINT_OVERLAP_MINS,
                defaults::CHECKPOINT_OVERLAP_MINS,
            )?),
            rescan_window: chrono::Duration::hours(parse_or(
                &lookup,
                env_config::RESCAN_WINDOW_HOURS,
                defaults::RESCAN_WINDOW_HOURS,
            )?),
            http: HttpClientConfig {
                timeout: Duration::from_secs(parse_or(
                    &lookup,
                    env_config::HTTP_CLIENT_TIMEOUT_SECS,
                    DEFAULT_TIMEOUT_SECS,
                )?),
                connect_timeout: Duration::from_secs(parse_or(
                    &lookup,
                    env_config::HTTP_CLIENT_CONNECT_TIMEOUT_SECS,
                    DEFAULT_CONNECT_TIMEOUT_SECS,
                )?),
            },
        };

        if config.sync_interval.is_zero() {
            return Err(anyhow!("{} must be greater than zero", env_config::SYNC_INTERVAL_SECS));
        }
        let windows = [
            (env_config::TOKEN_SAFETY_MARGIN_SECS, config.token_safety_margin),
            (env_config::INITIAL_LOOKBACK_HOURS, config.initial_lookback),
            (env_config::CHECKPOINT_OVERLAP_MINS, config.checkpoint_overlap),
            (env_config::RESCAN_WINDOW_HOURS, config.rescan_window),
        ];
        if let Some((name, _)) = windows
            .iter()
            .find(|(_, window)| *window < chrono::Duration::zero())
        {
            return Err(anyhow!("{name} must not be negative"));
        }

        Ok(config)
    }

    /// Check that every credential needed to sync is present
    ///
    /// # Errors
    ///
    /// Returns one error naming every missing variable
    pub fn validate(&self) -> Result<()> {
        let required = [
            (env_config::WITHINGS_CLIENT_ID, &self.withings.client_id),
            (env_config::WITHINGS_CLIENT_SECRET, &self.withings.client_secret),
            (env_config::OMRON_CLIENT_ID, &self.omron.client_id),
            (env_config::OMRON_CLIENT_SECRET, &self.omron.client_secret),
            (env_config::GOOGLE_CLIENT_ID, &self.google.client_id),
            (env_config::GOOGLE_CLIENT_SECRET, &self.google.client_secret),
            (env_config::GOOGLE_CALENDAR_ID, &self.calendar_id),
        ];

        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.is_empty())
            .map(|(name, _)| *name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(anyhow!(
                "Missing required configuration: {}",
                missing.join(", ")
            ))
        }
    }

    /// `OAuth` client for a token-bearing provider
    #[must_use]
    pub const fn oauth_client(&self, provider: Provider) -> &OAuthClientConfig {
        match provider {
            Provider::Withings => &self.withings,
            Provider::Omron => &self.omron,
            Provider::Calendar => &self.google,
        }
    }

    /// Log the non-secret parts of the configuration
    pub fn log_summary(&self) {
        info!(
            database_url = %self.database_url,
            calendar_id = %self.calendar_id,
            sync_interval_secs = self.sync_interval.as_secs(),
            rate_limit_per_minute = self.rate_limit.max_calls,
            retry_max_attempts = self.retry.max_attempts,
            retry_base_delay_ms = self.retry.base_delay.as_millis() as u64,
            rescan_window_hours = self.rescan_window.num_hours(),
            "configuration loaded"
        );
    }
}

fn parse_or<T, F>(lookup: &F, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name).map(|v| v.trim().to_owned()) {
        Some(raw) if !raw.is_empty() => raw
            .parse()
            .with_context(|| format!("Invalid {name} value: {raw}")),
        _ => Ok(default),
    }
}
