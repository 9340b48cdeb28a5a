// ABOUTME: Tests for measurement to calendar event mapping
// ABOUTME: Covers titles, descriptions, event windows and deterministic event ids
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use chrono::Duration;
use common::{at, blood_pressure, weight};
use health_calendar_sync::calendar::{event_id, to_event};
use health_sync_core::{Measurement, MeasurementKey, MeasurementValue, SleepStage, Source};

#[test]
fn test_weight_event() {
    let event = to_event(&weight("w1", 75.5));

    assert_eq!(event.title, "Weight: 75.5kg");
    assert_eq!(
        event.description,
        "Weight measurement: 75.5kg\nSource: Withings"
    );
    assert_eq!(event.start, at(1_700_000_000));
    assert_eq!(event.end, event.start + Duration::minutes(1));
}

#[test]
fn test_whole_kilograms_keep_one_decimal() {
    let event = to_event(&weight("w2", 80.0));
    assert_eq!(event.title, "Weight: 80.0kg");
}

#[test]
fn test_blood_pressure_event() {
    let event = to_event(&blood_pressure("bp1", 120, 80));

    assert_eq!(event.title, "BP: 120/80");
    assert_eq!(
        event.description,
        "Blood Pressure: 120/80 mmHg\nSource: Omron"
    );
}

#[test]
fn test_blood_pressure_with_pulse_and_irregular_heartbeat() {
    let measurement = Measurement::point(
        Source::Omron,
        "bp2",
        MeasurementValue::BloodPressure {
            systolic_mmhg: 135,
            diastolic_mmhg: 88,
            pulse_bpm: Some(71),
            irregular_heartbeat: true,
        },
        at(1_700_000_000),
    );
    let event = to_event(&measurement);

    assert_eq!(event.title, "BP: 135/88");
    assert_eq!(
        event.description,
        "Blood Pressure: 135/88 mmHg\nPulse: 71 bpm\nIrregular heartbeat detected\nSource: Omron"
    );
}

#[test]
fn test_heart_rate_event() {
    let measurement = Measurement::point(
        Source::Omron,
        "hr1",
        MeasurementValue::HeartRate {
            bpm: 64,
            activity_level: Some("resting".to_owned()),
        },
        at(1_700_000_000),
    );
    let event = to_event(&measurement);

    assert_eq!(event.title, "HR: 64 bpm");
    assert_eq!(
        event.description,
        "Heart Rate: 64 beats per minute\nActivity level: resting\nSource: Omron"
    );
}

#[test]
fn test_sleep_event_spans_interval() {
    let start = at(1_700_000_000);
    let end = start + Duration::minutes(45);
    let measurement = Measurement::interval(
        Source::Withings,
        "sleep-1700000000-1700002700",
        MeasurementValue::Sleep {
            stage: SleepStage::Deep,
        },
        start,
        end,
    );
    let event = to_event(&measurement);

    assert_eq!(event.title, "Sleep: Deep");
    assert_eq!(event.start, start);
    assert_eq!(event.end, end);
    assert_eq!(
        event.description,
        "Sleep state: Deep\nStart: 2023-11-14T22:13:20Z\nEnd: 2023-11-14T22:58:20Z\nSource: Withings"
    );
}

#[test]
fn test_mapping_is_deterministic() {
    let measurement = weight("w1", 75.5);
    assert_eq!(to_event(&measurement), to_event(&measurement));
}

#[test]
fn test_event_id_depends_on_source_and_external_id() {
    let withings = event_id(&MeasurementKey::new(Source::Withings, "42"));
    let omron = event_id(&MeasurementKey::new(Source::Omron, "42"));

    assert_ne!(withings, omron);
    assert_eq!(withings, event_id(&MeasurementKey::new(Source::Withings, "42")));
    assert_eq!(withings.len(), 64);
    assert!(withings.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_google_event_body() {
    let event = to_event(&weight("w1", 75.5));
    let body = event.to_google_event();

    assert_eq!(body["id"], event.event_id.as_str());
    assert_eq!(body["summary"], "Weight: 75.5kg");
    assert_eq!(body["start"]["dateTime"], "2023-11-14T22:13:20Z");
    assert_eq!(body["end"]["dateTime"], "2023-11-14T22:14:20Z");
    assert_eq!(body["start"]["timeZone"], "UTC");
}
