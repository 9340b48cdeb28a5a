// ABOUTME: Main library entry point for the health calendar sync engine
// ABOUTME: Token lifecycle, sync state, calendar mapping, and the orchestrator that ties them together
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Health Calendar Sync
//!
//! Periodically pulls weight, sleep, blood pressure and heart rate
//! measurements from Withings and Omron and mirrors each new one as an
//! event in Google Calendar.
//!
//! ## Guarantees
//!
//! - **No duplicates**: every measurement key maps to one deterministic
//!   event id, checked against the sync ledger before publishing
//! - **No misses**: an adapter's checkpoint only advances after every
//!   measurement in its window was published or skipped as a duplicate
//! - **No stale tokens**: tokens are refreshed before they enter the
//!   safety margin, one refresh per provider at a time
//!
//! ## Architecture
//!
//! - **`health_sync_core`**: canonical measurement model and error taxonomy
//! - **`health_sync_providers`**: vendor adapters, rate limiter, retry policy
//! - **tokens**: `TokenManager`, the only owner of OAuth tokens
//! - **ledger**: `DeduplicationLedger` over the `SQLite` record store
//! - **calendar**: measurement to event mapping and the Google client
//! - **orchestrator**: `SyncOrchestrator` running fetch, dedup and publish
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use health_calendar_sync::app::SyncServices;
//! use health_calendar_sync::config::SyncConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SyncConfig::from_env()?;
//!     config.validate()?;
//!
//!     let services = SyncServices::build(&config).await?;
//!     let (_stop, shutdown) = tokio::sync::watch::channel(false);
//!     let report = services.orchestrator.run_cycle(&shutdown).await;
//!     println!("published {} events", report.published());
//!     Ok(())
//! }
//! ```

/// Service wiring from configuration
pub mod app;

/// Calendar event mapping and the Google Calendar client
pub mod calendar;

/// Environment-driven configuration
pub mod config;

/// `SQLite` stores for sync records, tokens and checkpoints
pub mod database;

/// Deduplication ledger
pub mod ledger;

/// Structured logging bootstrap
pub mod logging;

/// Sync cycle driver
pub mod orchestrator;

/// OAuth token lifecycle
pub mod tokens;

