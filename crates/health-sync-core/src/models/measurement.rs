// ABOUTME: Canonical measurement model shared by adapters, ledger, mapper and orchestrator
// ABOUTME: Tagged measurement values with boundary validation against physiological limits
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::provider::Source;
use super::sync_record::MeasurementKey;
use crate::constants::limits;
use crate::errors::ValidationError;

/// Kind of physiological measurement
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MeasureKind {
    /// Body weight
    Weight,
    /// Sleep stage interval
    Sleep,
    /// Blood pressure reading
    BloodPressure,
    /// Heart rate reading
    HeartRate,
}

impl fmt::Display for MeasureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weight => write!(f, "weight"),
            Self::Sleep => write!(f, "sleep"),
            Self::BloodPressure => write!(f, "blood_pressure"),
            Self::HeartRate => write!(f, "heart_rate"),
        }
    }
}

/// Types of sleep stages
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SleepStage {
    /// Awake stage - user is conscious and alert
    Awake,
    /// Light sleep stage - easy to wake from, body relaxing
    Light,
    /// Deep sleep stage - restorative, hard to wake from
    Deep,
    /// REM (Rapid Eye Movement) sleep stage
    Rem,
}

impl fmt::Display for SleepStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Awake => write!(f, "Awake"),
            Self::Light => write!(f, "Light"),
            Self::Deep => write!(f, "Deep"),
            Self::Rem => write!(f, "REM"),
        }
    }
}

/// Structured payload of a measurement, one variant per kind
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MeasurementValue {
    /// Body weight in kilograms
    Weight {
        /// Weight in kilograms
        kilograms: f64,
    },
    /// Sleep stage for the measurement interval
    Sleep {
        /// Stage the sleeper was in
        stage: SleepStage,
    },
    /// Blood pressure reading
    BloodPressure {
        /// Systolic pressure in mmHg
        systolic_mmhg: u16,
        /// Diastolic pressure in mmHg
        diastolic_mmhg: u16,
        /// Pulse measured alongside the pressure, if reported
        pulse_bpm: Option<u16>,
        /// Whether the device flagged an irregular heartbeat
        irregular_heartbeat: bool,
    },
    /// Heart rate reading
    HeartRate {
        /// Beats per minute
        bpm: u16,
        /// Vendor-reported activity level at measurement time
        activity_level: Option<String>,
    },
}

impl MeasurementValue {
    /// Kind implied by this payload
    #[must_use]
    pub const fn kind(&self) -> MeasureKind {
        match self {
            Self::Weight { .. } => MeasureKind::Weight,
            Self::Sleep { .. } => MeasureKind::Sleep,
            Self::BloodPressure { .. } => MeasureKind::BloodPressure,
            Self::HeartRate { .. } => MeasureKind::HeartRate,
        }
    }
}

/// Canonical, vendor-agnostic health reading
///
/// `external_id` is unique per `source` and is the only key used for
/// deduplication. `timestamp_end` is set for interval measurements (sleep)
/// and left absent for point measurements.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Measurement {
    /// Vendor the reading came from
    pub source: Source,
    /// Vendor-assigned unique id
    pub external_id: String,
    /// Structured value
    pub value: MeasurementValue,
    /// Measurement instant, or interval start
    pub timestamp_start: DateTime<Utc>,
    /// Interval end for sleep measurements
    pub timestamp_end: Option<DateTime<Utc>>,
}

impl Measurement {
    /// Build a point-in-time measurement
    #[must_use]
    pub fn point(
        source: Source,
        external_id: impl Into<String>,
        value: MeasurementValue,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            source,
            external_id: external_id.into(),
            value,
            timestamp_start: at,
            timestamp_end: None,
        }
    }

    /// Build an interval measurement
    #[must_use]
    pub fn interval(
        source: Source,
        external_id: impl Into<String>,
        value: MeasurementValue,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            source,
            external_id: external_id.into(),
            value,
            timestamp_start: start,
            timestamp_end: Some(end),
        }
    }

    /// Kind of this measurement
    #[must_use]
    pub const fn kind(&self) -> MeasureKind {
        self.value.kind()
    }

    /// Deduplication key `(source, external_id)`
    #[must_use]
    pub fn key(&self) -> MeasurementKey {
        MeasurementKey::new(self.source, self.external_id.clone())
    }

    /// Check required fields and physiological plausibility
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` describing the first violated rule.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let reject = |reason: String| {
            Err(ValidationError::new(
                self.source,
                Some(self.external_id.clone()),
                reason,
            ))
        };

        if self.external_id.trim().is_empty() {
            return reject("missing external id".to_owned());
        }

        match (&self.value, self.timestamp_end) {
            (MeasurementValue::Sleep { .. }, None) => {
                return reject("sleep measurement without an end time".to_owned());
            }
            (MeasurementValue::Sleep { .. }, Some(end)) if end <= self.timestamp_start => {
                return reject(format!(
                    "sleep interval ends ({end}) before it starts ({})",
                    self.timestamp_start
                ));
            }
            (MeasurementValue::Sleep { .. }, Some(_)) => {}
            (_, Some(_)) => {
                return reject("point measurement carries an end time".to_owned());
            }
            (_, None) => {}
        }

        match &self.value {
            MeasurementValue::Weight { kilograms } => {
                if !kilograms.is_finite() || *kilograms <= 0.0 || *kilograms > limits::MAX_WEIGHT_KG
                {
                    return reject(format!("weight {kilograms}kg outside plausible range"));
                }
            }
            MeasurementValue::BloodPressure {
                systolic_mmhg,
                diastolic_mmhg,
                pulse_bpm,
                ..
            } => {
                if !(limits::MIN_SYSTOLIC_MMHG..=limits::MAX_SYSTOLIC_MMHG)
                    .contains(systolic_mmhg)
                {
                    return reject(format!("systolic {systolic_mmhg} mmHg outside plausible range"));
                }
                if !(limits::MIN_DIASTOLIC_MMHG..=limits::MAX_DIASTOLIC_MMHG)
                    .contains(diastolic_mmhg)
                {
                    return reject(format!(
                        "diastolic {diastolic_mmhg} mmHg outside plausible range"
                    ));
                }
                if diastolic_mmhg >= systolic_mmhg {
                    return reject(format!(
                        "diastolic {diastolic_mmhg} not below systolic {systolic_mmhg}"
                    ));
                }
                if let Some(pulse) = pulse_bpm {
                    if !heart_rate_in_range(*pulse) {
                        return reject(format!("pulse {pulse} bpm outside plausible range"));
                    }
                }
            }
            MeasurementValue::HeartRate { bpm, .. } => {
                if !heart_rate_in_range(*bpm) {
                    return reject(format!("heart rate {bpm} bpm outside plausible range"));
                }
            }
            MeasurementValue::Sleep { .. } => {}
        }

        Ok(())
    }
}

fn heart_rate_in_range(bpm: u16) -> bool {
    (limits::MIN_HEART_RATE_BPM..=limits::MAX_HEART_RATE_BPM).contains(&bpm)
}
