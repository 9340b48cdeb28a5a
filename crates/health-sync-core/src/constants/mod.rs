// ABOUTME: Constants module with domain-separated organization
// ABOUTME: Provider identifiers, physiological bounds, and engine defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Constants module
//!
//! Constants are grouped into logical domains rather than being in a single
//! flat namespace.

/// Provider identifiers used as rate-limit keys, log fields and storage keys
pub mod providers {
    /// Withings provider identifier
    pub const WITHINGS: &str = "withings";
    /// Omron provider identifier
    pub const OMRON: &str = "omron";
    /// Calendar service identifier
    pub const CALENDAR: &str = "calendar";
}

/// Vendor and calendar endpoint defaults
pub mod endpoints {
    /// Withings public API base URL
    pub const WITHINGS_API_BASE: &str = "https://wbsapi.withings.net";
    /// Withings OAuth token endpoint (uses `action=requesttoken`)
    pub const WITHINGS_TOKEN_URL: &str = "https://wbsapi.withings.net/v2/oauth2";
    /// Omron wellness API base URL
    pub const OMRON_API_BASE: &str = "https://api-omronwellness.com/v1";
    /// Omron OAuth token endpoint
    pub const OMRON_TOKEN_URL: &str = "https://api-omronwellness.com/oauth/token";
    /// Google Calendar v3 API base URL
    pub const GOOGLE_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
    /// Google OAuth token endpoint
    pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
}

/// Physiologically plausible bounds applied at the adapter boundary
pub mod limits {
    /// Upper bound for body weight in kilograms (lower bound is exclusive zero)
    pub const MAX_WEIGHT_KG: f64 = 500.0;
    /// Minimum plausible systolic pressure (mmHg)
    pub const MIN_SYSTOLIC_MMHG: u16 = 50;
    /// Maximum plausible systolic pressure (mmHg)
    pub const MAX_SYSTOLIC_MMHG: u16 = 300;
    /// Minimum plausible diastolic pressure (mmHg)
    pub const MIN_DIASTOLIC_MMHG: u16 = 30;
    /// Maximum plausible diastolic pressure (mmHg)
    pub const MAX_DIASTOLIC_MMHG: u16 = 200;
    /// Minimum plausible heart rate (bpm)
    pub const MIN_HEART_RATE_BPM: u16 = 20;
    /// Maximum plausible heart rate (bpm)
    pub const MAX_HEART_RATE_BPM: u16 = 300;
}

/// Engine defaults used when configuration does not override them
pub mod defaults {
    /// Calls allowed per provider per rate-limit window
    pub const RATE_LIMIT_CALLS_PER_WINDOW: u32 = 30;
    /// Rate-limit window length in seconds
    pub const RATE_LIMIT_WINDOW_SECS: u64 = 60;
    /// Maximum attempts for a retried operation
    pub const RETRY_MAX_ATTEMPTS: u32 = 3;
    /// Base backoff delay in milliseconds
    pub const RETRY_BASE_DELAY_MS: u64 = 1000;
    /// Backoff ceiling in milliseconds
    pub const RETRY_MAX_DELAY_MS: u64 = 30_000;
    /// Jitter applied to each backoff delay (fraction of the delay)
    pub const RETRY_JITTER_FACTOR: f64 = 0.1;
    /// Tokens expiring within this many seconds are refreshed first
    pub const TOKEN_SAFETY_MARGIN_SECS: i64 = 60;
    /// Period between sync cycles
    pub const SYNC_INTERVAL_SECS: u64 = 60;
    /// Fetch window for an adapter with no checkpoint yet
    pub const INITIAL_LOOKBACK_HOURS: i64 = 24;
    /// Fetch window overlap before the stored checkpoint
    pub const CHECKPOINT_OVERLAP_MINS: i64 = 60;
    /// Trailing window every fetch re-scans for readings uploaded late
    pub const RESCAN_WINDOW_HOURS: i64 = 36;
    /// Length of the calendar event created for point measurements
    pub const POINT_EVENT_DURATION_MINS: i64 = 1;
    /// Default `SQLite` database location
    pub const DATABASE_URL: &str = "sqlite:./data/health_sync.db";
}

/// Environment variable names read by the configuration layer
pub mod env_config {
    /// Withings OAuth client id
    pub const WITHINGS_CLIENT_ID: &str = "WITHINGS_CLIENT_ID";
    /// Withings OAuth client secret
    pub const WITHINGS_CLIENT_SECRET: &str = "WITHINGS_CLIENT_SECRET";
    /// Optional Withings API base override
    pub const WITHINGS_API_BASE: &str = "WITHINGS_API_BASE";
    /// Omron OAuth client id
    pub const OMRON_CLIENT_ID: &str = "OMRON_CLIENT_ID";
    /// Omron OAuth client secret
    pub const OMRON_CLIENT_SECRET: &str = "OMRON_CLIENT_SECRET";
    /// Optional Omron API base override
    pub const OMRON_API_BASE: &str = "OMRON_API_BASE";
    /// Optional Omron token endpoint override
    pub const OMRON_TOKEN_URL: &str = "OMRON_TOKEN_URL";
    /// Optional Withings token endpoint override
    pub const WITHINGS_TOKEN_URL: &str = "WITHINGS_TOKEN_URL";
    /// Google OAuth client id
    pub const GOOGLE_CLIENT_ID: &str = "GOOGLE_CLIENT_ID";
    /// Google OAuth client secret
    pub const GOOGLE_CLIENT_SECRET: &str = "GOOGLE_CLIENT_SECRET";
    /// Target calendar id
    pub const GOOGLE_CALENDAR_ID: &str = "GOOGLE_CALENDAR_ID";
    /// Optional Google token endpoint override
    pub const GOOGLE_TOKEN_URL: &str = "GOOGLE_TOKEN_URL";
    /// Optional Google Calendar API base override
    pub const GOOGLE_CALENDAR_API_BASE: &str = "GOOGLE_CALENDAR_API_BASE";
    /// Database URL for sync state
    pub const DATABASE_URL: &str = "DATABASE_URL";
    /// Seconds between sync cycles
    pub const SYNC_INTERVAL_SECS: &str = "HEALTH_SYNC_INTERVAL_SECS";
    /// Calls per minute per provider
    pub const RATE_LIMIT_PER_MINUTE: &str = "HEALTH_SYNC_RATE_LIMIT_PER_MINUTE";
    /// Retry attempt budget
    pub const RETRY_MAX_ATTEMPTS: &str = "HEALTH_SYNC_RETRY_MAX_ATTEMPTS";
    /// Retry base delay in milliseconds
    pub const RETRY_BASE_DELAY_MS: &str = "HEALTH_SYNC_RETRY_BASE_DELAY_MS";
    /// Retry delay ceiling in milliseconds
    pub const RETRY_MAX_DELAY_MS: &str = "HEALTH_SYNC_RETRY_MAX_DELAY_MS";
    /// Retry jitter factor (0.0 - 1.0)
    pub const RETRY_JITTER_FACTOR: &str = "HEALTH_SYNC_RETRY_JITTER_FACTOR";
    /// Token refresh safety margin in seconds
    pub const TOKEN_SAFETY_MARGIN_SECS: &str = "HEALTH_SYNC_TOKEN_SAFETY_MARGIN_SECS";
    /// Initial lookback for adapters without a checkpoint
    pub const INITIAL_LOOKBACK_HOURS: &str = "HEALTH_SYNC_INITIAL_LOOKBACK_HOURS";
    /// Overlap subtracted from the checkpoint on each fetch
    pub const CHECKPOINT_OVERLAP_MINS: &str = "HEALTH_SYNC_CHECKPOINT_OVERLAP_MINS";
    /// Trailing re-scan window in hours
    pub const RESCAN_WINDOW_HOURS: &str = "HEALTH_SYNC_RESCAN_WINDOW_HOURS";
    /// HTTP request timeout in seconds
    pub const HTTP_CLIENT_TIMEOUT_SECS: &str = "HTTP_CLIENT_TIMEOUT_SECS";
    /// HTTP connect timeout in seconds
    pub const HTTP_CLIENT_CONNECT_TIMEOUT_SECS: &str = "HTTP_CLIENT_CONNECT_TIMEOUT_SECS";
}
