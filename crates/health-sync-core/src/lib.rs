// ABOUTME: Core types and constants for the health calendar sync engine
// ABOUTME: Foundation crate with the canonical measurement model, error taxonomy, and constants
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Health Sync Core
//!
//! Foundation crate providing the shared types every other part of the sync
//! engine operates on. It is designed to change infrequently so the provider
//! and engine crates get incremental compilation benefits.
//!
//! ## Modules
//!
//! - **models**: Canonical `Measurement`, `SyncRecord`, `Token` and `Checkpoint`
//! - **errors**: `ProviderError`, `ValidationError` and the top-level `SyncError`
//! - **constants**: Provider identifiers, physiological bounds and defaults

/// Error taxonomy shared by adapters, stores and the orchestrator
pub mod errors;

/// Application constants organized by domain
pub mod constants;

/// Canonical data model (measurements, sync records, tokens, checkpoints)
pub mod models;

pub use errors::{ErrorKind, ProviderError, ProviderResult, SyncError, SyncResult, ValidationError};
pub use models::{
    Checkpoint, MeasureKind, Measurement, MeasurementKey, MeasurementValue, Provider, SleepStage,
    Source, SyncRecord, Token,
};
