// ABOUTME: Durable sync state records: per-measurement sync proof and per-adapter checkpoint
// ABOUTME: SyncRecord is append-only; Checkpoint is the fetch watermark for one source
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::provider::Source;

/// Deduplication key for a measurement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeasurementKey {
    /// Vendor the measurement came from
    pub source: Source,
    /// Vendor-assigned id, unique per source
    pub external_id: String,
}

impl MeasurementKey {
    /// Create a key
    #[must_use]
    pub fn new(source: Source, external_id: impl Into<String>) -> Self {
        Self {
            source,
            external_id: external_id.into(),
        }
    }
}

impl fmt::Display for MeasurementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source.as_str(), self.external_id)
    }
}

/// Durable proof that a measurement already produced a calendar event
///
/// Created once the calendar confirms the event, never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncRecord {
    /// Key of the synced measurement
    pub measurement_key: MeasurementKey,
    /// Id of the calendar event created for it
    pub calendar_event_id: String,
    /// When the record was written
    pub synced_at: DateTime<Utc>,
}

/// Last successfully completed fetch window for one adapter
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Checkpoint {
    /// Adapter the watermark belongs to
    pub source: Source,
    /// Instant the last complete fetch started
    pub fetched_through: DateTime<Utc>,
}
