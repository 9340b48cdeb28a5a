// ABOUTME: Core data models for the health calendar sync engine
// ABOUTME: Re-exports Measurement, SyncRecord, Token, Checkpoint and provider identifiers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Data Models
//!
//! Canonical, vendor-agnostic shapes shared by every component.
//!
//! ## Design Principles
//!
//! - **Provider Agnostic**: adapters translate vendor payloads into these types once
//! - **Tagged values**: the measurement kind is the variant of its value, so the two
//!   can never disagree
//! - **Serializable**: all models round-trip through JSON for logs and reports
//!
//! ## Lifecycle
//!
//! - `Measurement`: ephemeral, built per fetch cycle and discarded after publishing
//! - `SyncRecord`: durable and append-only proof that an event exists
//! - `Token`: durable, replaced in place by the token manager on refresh
//! - `Checkpoint`: durable per-adapter fetch watermark

mod measurement;
mod provider;
mod sync_record;
mod token;

pub use measurement::{MeasureKind, Measurement, MeasurementValue, SleepStage};
pub use provider::{Provider, Source};
pub use sync_record::{Checkpoint, MeasurementKey, SyncRecord};
pub use token::Token;
