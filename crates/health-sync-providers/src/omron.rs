// ABOUTME: Omron adapter fetching blood pressure and heart rate readings
// ABOUTME: Maps Omron wellness API readings into canonical measurements
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, SecondsFormat, Utc};
use health_sync_core::constants::{defaults, endpoints, providers};
use health_sync_core::{
    Measurement, MeasurementValue, Provider, ProviderError, Source, SyncResult, ValidationError,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::adapter::{saturating_u16, AdapterContext, DeviceAdapter, FetchBatch};

#[derive(Debug, Default, Deserialize)]
struct ReadingsPage {
    #[serde(default)]
    readings: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct BloodPressureReading {
    id: Option<Value>,
    datetime: Option<String>,
    systolic: Option<f64>,
    diastolic: Option<f64>,
    pulse: Option<f64>,
    #[serde(default)]
    irregular: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct HeartRateReading {
    id: Option<Value>,
    datetime: Option<String>,
    value: Option<f64>,
    activity_level: Option<String>,
}

/// Adapter for the Omron wellness API
pub struct OmronAdapter {
    context: AdapterContext,
    api_base: String,
    rescan_window: Duration,
}

impl OmronAdapter {
    /// Adapter against the public Omron endpoint
    #[must_use]
    pub fn new(context: AdapterContext) -> Self {
        Self::with_api_base(context, endpoints::OMRON_API_BASE)
    }

    /// Adapter against a custom base URL
    #[must_use]
    pub fn with_api_base(context: AdapterContext, api_base: impl Into<String>) -> Self {
        Self {
            context,
            api_base: api_base.into().trim_end_matches('/').to_owned(),
            rescan_window: Duration::hours(defaults::RESCAN_WINDOW_HOURS),
        }
    }

    /// Re-scan at least this much trailing history on every fetch
    ///
    /// Readings reach the cloud when the cuff syncs through the phone, which
    /// can be long after they were taken.
    #[must_use]
    pub fn with_rescan_window(mut self, window: Duration) -> Self {
        self.rescan_window = window;
        self
    }

    async fn fetch_readings(
        &self,
        path: &str,
        operation: &str,
        since: DateTime<Utc>,
    ) -> SyncResult<Vec<Value>> {
        let url = format!("{}/{path}", self.api_base);
        let query = [("since", since.to_rfc3339_opts(SecondsFormat::Secs, true))];
        let body = self
            .context
            .get_json(Provider::Omron, operation, &url, &query)
            .await?;
        if body.is_null() {
            return Ok(Vec::new());
        }
        let page: ReadingsPage = serde_json::from_value(body)
            .map_err(|e| ProviderError::invalid_response(providers::OMRON, e.to_string()))?;
        Ok(page.readings)
    }
}

#[async_trait]
impl DeviceAdapter for OmronAdapter {
    fn source(&self) -> Source {
        Source::Omron
    }

    async fn fetch_since(&self, since: DateTime<Utc>) -> SyncResult<FetchBatch> {
        let mut batch = FetchBatch::new(Source::Omron);
        let since = since.min(Utc::now() - self.rescan_window);

        let pressure = self
            .fetch_readings("bloodpressure/readings", "omron.bloodpressure", since)
            .await?;
        for raw in pressure {
            map_blood_pressure(raw, &mut batch);
        }

        let heart_rate = self
            .fetch_readings("heartrate/readings", "omron.heartrate", since)
            .await?;
        for raw in heart_rate {
            map_heart_rate(raw, &mut batch);
        }

        batch.sort_chronologically();
        info!(
            provider = providers::OMRON,
            since = %since,
            fetched = batch.measurements.len(),
            rejected = batch.rejected.len(),
            "omron fetch complete"
        );
        Ok(batch)
    }
}

/// Omron ids arrive as strings or numbers
fn reading_id(id: Option<&Value>) -> Option<String> {
    match id? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// RFC 3339, or a zone-less ISO 8601 timestamp taken as UTC
fn parse_reading_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

fn reading_time(
    raw: Option<&str>,
    external_id: &str,
    batch: &mut FetchBatch,
) -> Option<DateTime<Utc>> {
    let parsed = raw.and_then(parse_reading_time);
    if parsed.is_none() {
        batch.reject(ValidationError::new(
            Source::Omron,
            Some(external_id.to_owned()),
            format!("missing or unparseable datetime {raw:?}"),
        ));
    }
    parsed
}

fn map_blood_pressure(raw: Value, batch: &mut FetchBatch) {
    let reading: BloodPressureReading = match serde_json::from_value(raw) {
        Ok(reading) => reading,
        Err(e) => {
            batch.reject(ValidationError::new(
                Source::Omron,
                None,
                format!("malformed blood pressure reading: {e}"),
            ));
            return;
        }
    };

    let Some(external_id) = reading_id(reading.id.as_ref()) else {
        batch.reject(ValidationError::new(
            Source::Omron,
            None,
            "blood pressure reading without id",
        ));
        return;
    };
    let Some(at) = reading_time(reading.datetime.as_deref(), &external_id, batch) else {
        return;
    };
    let (Some(systolic), Some(diastolic)) = (reading.systolic, reading.diastolic) else {
        batch.reject(ValidationError::new(
            Source::Omron,
            Some(external_id),
            "blood pressure reading without systolic or diastolic value",
        ));
        return;
    };

    batch.accept(Measurement::point(
        Source::Omron,
        external_id,
        MeasurementValue::BloodPressure {
            systolic_mmhg: saturating_u16(systolic),
            diastolic_mmhg: saturating_u16(diastolic),
            pulse_bpm: reading.pulse.map(saturating_u16),
            irregular_heartbeat: reading.irregular.unwrap_or(false),
        },
        at,
    ));
}

fn map_heart_rate(raw: Value, batch: &mut FetchBatch) {
    let reading: HeartRateReading = match serde_json::from_value(raw) {
        Ok(reading) => reading,
        Err(e) => {
            batch.reject(ValidationError::new(
                Source::Omron,
                None,
                format!("malformed heart rate reading: {e}"),
            ));
            return;
        }
    };

    let Some(external_id) = reading_id(reading.id.as_ref()) else {
        batch.reject(ValidationError::new(
            Source::Omron,
            None,
            "heart rate reading without id",
        ));
        return;
    };
    let Some(at) = reading_time(reading.datetime.as_deref(), &external_id, batch) else {
        return;
    };
    let Some(bpm) = reading.value else {
        batch.reject(ValidationError::new(
            Source::Omron,
            Some(external_id),
            "heart rate reading without value",
        ));
        return;
    };

    batch.accept(Measurement::point(
        Source::Omron,
        external_id,
        MeasurementValue::HeartRate {
            bpm: saturating_u16(bpm),
            activity_level: reading.activity_level,
        },
        at,
    ));
}
