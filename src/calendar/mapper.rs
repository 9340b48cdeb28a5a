// ABOUTME: Pure mapping from canonical measurements to calendar event payloads
// ABOUTME: Deterministic titles, descriptions, time spans and event ids
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::fmt::Write as _;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use health_sync_core::constants::defaults;
use health_sync_core::{Measurement, MeasurementKey, MeasurementValue};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// Calendar event derived from one measurement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPayload {
    /// Deterministic event id (lowercase hex, valid for Google Calendar)
    pub event_id: String,
    /// Event title
    pub title: String,
    /// Event body
    pub description: String,
    /// Event start
    pub start: DateTime<Utc>,
    /// Event end
    pub end: DateTime<Utc>,
}

impl EventPayload {
    /// Google Calendar `events.insert` request body
    #[must_use]
    pub fn to_google_event(&self) -> Value {
        json!({
            "id": self.event_id,
            "summary": self.title,
            "description": self.description,
            "start": { "dateTime": rfc3339(self.start), "timeZone": "UTC" },
            "end": { "dateTime": rfc3339(self.end), "timeZone": "UTC" },
        })
    }
}

/// Calendar event id for a measurement key
///
/// Hex SHA-256 of `source:external_id`; hex digits fall inside the id
/// alphabet Google Calendar accepts.
#[must_use]
pub fn event_id(key: &MeasurementKey) -> String {
    let digest = Sha256::digest(format!("{}:{}", key.source.as_str(), key.external_id).as_bytes());
    hex::encode(digest)
}

/// Map a measurement to its calendar event
#[must_use]
pub fn to_event(measurement: &Measurement) -> EventPayload {
    let start = measurement.timestamp_start;
    let end = measurement
        .timestamp_end
        .unwrap_or_else(|| start + Duration::minutes(defaults::POINT_EVENT_DURATION_MINS));

    let (title, mut description) = match &measurement.value {
        MeasurementValue::Weight { kilograms } => {
            let weight = format_kilograms(*kilograms);
            (
                format!("Weight: {weight}kg"),
                format!("Weight measurement: {weight}kg"),
            )
        }
        MeasurementValue::BloodPressure {
            systolic_mmhg,
            diastolic_mmhg,
            pulse_bpm,
            irregular_heartbeat,
        } => {
            let mut description =
                format!("Blood Pressure: {systolic_mmhg}/{diastolic_mmhg} mmHg");
            if let Some(pulse) = pulse_bpm {
                let _ = write!(description, "\nPulse: {pulse} bpm");
            }
            if *irregular_heartbeat {
                description.push_str("\nIrregular heartbeat detected");
            }
            (format!("BP: {systolic_mmhg}/{diastolic_mmhg}"), description)
        }
        MeasurementValue::HeartRate {
            bpm,
            activity_level,
        } => {
            let mut description = format!("Heart Rate: {bpm} beats per minute");
            if let Some(level) = activity_level {
                let _ = write!(description, "\nActivity level: {level}");
            }
            (format!("HR: {bpm} bpm"), description)
        }
        MeasurementValue::Sleep { stage } => (
            format!("Sleep: {stage}"),
            format!(
                "Sleep state: {stage}\nStart: {}\nEnd: {}",
                rfc3339(start),
                rfc3339(end)
            ),
        ),
    };
    let _ = write!(description, "\nSource: {}", measurement.source);

    EventPayload {
        event_id: event_id(&measurement.key()),
        title,
        description,
        start,
        end,
    }
}

/// Whole kilograms keep one decimal so `80.0` does not render as `80`
fn format_kilograms(kilograms: f64) -> String {
    if kilograms.fract().abs() < f64::EPSILON {
        format!("{kilograms:.1}")
    } else {
        format!("{kilograms}")
    }
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
