// ABOUTME: Tests for the canonical measurement model and error classification
// ABOUTME: Covers validation ranges, token freshness, identifier parsing and retry classes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use std::time::Duration as StdDuration;

use chrono::Duration;
use common::{at, blood_pressure, token, weight};
use health_sync_core::{
    ErrorKind, MeasureKind, Measurement, MeasurementValue, Provider, ProviderError, SleepStage,
    Source, SyncError,
};

fn heart_rate(bpm: u16) -> Measurement {
    Measurement::point(
        Source::Omron,
        "hr",
        MeasurementValue::HeartRate {
            bpm,
            activity_level: None,
        },
        at(1_700_000_000),
    )
}

#[test]
fn test_plausible_readings_validate() {
    assert!(weight("w", 75.5).validate().is_ok());
    assert!(blood_pressure("bp", 120, 80).validate().is_ok());
    assert!(heart_rate(60).validate().is_ok());
}

#[test]
fn test_out_of_range_readings_are_rejected() {
    for kilograms in [0.0, -3.0, 501.0, f64::NAN] {
        let err = weight("w", kilograms).validate().unwrap_err();
        assert_eq!(err.source, Source::Withings);
        assert_eq!(err.external_id.as_deref(), Some("w"));
    }
    assert!(blood_pressure("bp", 80, 90).validate().is_err());
    assert!(blood_pressure("bp", 120, 120).validate().is_err());
    assert!(blood_pressure("bp", 320, 80).validate().is_err());
    assert!(heart_rate(10).validate().is_err());
    assert!(heart_rate(301).validate().is_err());
}

#[test]
fn test_empty_external_id_is_rejected() {
    assert!(weight("", 75.0).validate().is_err());
}

#[test]
fn test_sleep_needs_forward_interval() {
    let start = at(1_700_000_000);
    let deep = MeasurementValue::Sleep {
        stage: SleepStage::Deep,
    };

    let ok = Measurement::interval(Source::Withings, "s", deep.clone(), start, start + Duration::minutes(5));
    assert!(ok.validate().is_ok());
    assert_eq!(ok.kind(), MeasureKind::Sleep);

    let backwards = Measurement::interval(Source::Withings, "s", deep.clone(), start, start);
    assert!(backwards.validate().is_err());

    let open = Measurement::point(Source::Withings, "s", deep, start);
    assert!(open.validate().is_err());

    let mut point_with_end = weight("w", 70.0);
    point_with_end.timestamp_end = Some(start + Duration::minutes(1));
    assert!(point_with_end.validate().is_err());
}

#[test]
fn test_token_freshness_respects_margin() {
    let now = chrono::Utc::now();
    let current = token(Provider::Withings, "a", Duration::minutes(10));

    assert!(current.is_fresh_at(now, Duration::minutes(5)));
    assert!(!current.is_fresh_at(now, Duration::minutes(15)));
}

#[test]
fn test_token_debug_hides_secrets() {
    let rendered = format!("{:?}", token(Provider::Omron, "secret-access", Duration::hours(1)));

    assert!(!rendered.contains("secret-access"));
    assert!(rendered.contains("Omron"));
}

#[test]
fn test_identifiers_parse_case_insensitively() {
    assert_eq!("Withings".parse::<Source>().unwrap(), Source::Withings);
    assert_eq!("OMRON".parse::<Provider>().unwrap(), Provider::Omron);
    assert_eq!("google".parse::<Provider>().unwrap(), Provider::Calendar);
    assert!("fitbit".parse::<Source>().is_err());
    assert_eq!(Source::Omron.provider(), Provider::Omron);
}

#[test]
fn test_provider_error_retry_classes() {
    assert!(ProviderError::network("omron", "reset").is_retryable());
    assert!(ProviderError::api("omron", 503, "down").is_retryable());
    assert!(!ProviderError::api("omron", 404, "gone").is_retryable());
    assert!(!ProviderError::auth_failed("omron", "bad token").is_retryable());

    let throttled = ProviderError::rate_limited("withings", Some(12));
    assert!(throttled.is_retryable());
    assert_eq!(throttled.retry_after(), Some(StdDuration::from_secs(12)));
    assert_eq!(throttled.provider(), "withings");
}

#[test]
fn test_sync_error_classification() {
    let expired = SyncError::from(ProviderError::auth_expired("calendar", "revoked"));
    assert!(expired.is_auth_expired());
    assert_eq!(expired.kind(), ErrorKind::AuthExpired);

    let rejected = SyncError::from(ProviderError::api("calendar", 400, "bad event"));
    assert_eq!(rejected.kind(), ErrorKind::Provider);

    assert_eq!(SyncError::storage("disk full").kind(), ErrorKind::Storage);
    assert_eq!(ErrorKind::SyncFailure.to_string(), "sync_failure");
}
