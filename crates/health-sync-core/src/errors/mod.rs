// ABOUTME: Error taxonomy for the health calendar sync engine
// ABOUTME: Provider transport errors, validation drops, and cycle-level sync errors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Error Types
//!
//! - `ProviderError` - failures talking to a vendor, token endpoint or calendar,
//!   classified as transient (retryable) or not
//! - `ValidationError` - a single vendor record rejected at the adapter boundary
//! - `SyncError` - what the retry policy, stores and orchestrator surface
//! - `ErrorKind` - flat classification used as a structured log field

/// Provider-level errors with retry classification
pub mod provider;
/// Cycle-level errors and error kinds
pub mod sync;

pub use provider::{ProviderError, ProviderResult};
pub use sync::{ErrorKind, SyncError, SyncResult, ValidationError};
