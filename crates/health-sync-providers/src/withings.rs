// ABOUTME: Withings adapter fetching weight, heart pulse and sleep series
// ABOUTME: Unwraps the Withings status envelope and maps measure groups into canonical measurements
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use health_sync_core::constants::{defaults, endpoints, providers};
use health_sync_core::{
    Measurement, MeasurementValue, Provider, ProviderError, ProviderResult, SleepStage, Source,
    SyncResult, ValidationError,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::adapter::{saturating_u16, AdapterContext, DeviceAdapter, FetchBatch};

/// Withings status code for success
const STATUS_OK: i64 = 0;
/// Withings status code for an invalid or expired access token
const STATUS_INVALID_TOKEN: i64 = 401;
/// Withings status code for throttled requests
const STATUS_TOO_MANY_REQUESTS: i64 = 601;
/// Withings status code for an unspecified server-side error, the only retryable one
const STATUS_UNKNOWN_ERROR: i64 = 2555;

/// Measure type for body weight (kg)
const MEASURE_TYPE_WEIGHT: i64 = 1;
/// Measure type for heart pulse (bpm)
const MEASURE_TYPE_HEART_PULSE: i64 = 11;

/// Sleep series queries must span at most one day
const SLEEP_QUERY_SPAN_HOURS: i64 = 24;

/// Unwrap a Withings `{status, body}` response
///
/// Withings answers HTTP 200 for most failures and reports them in `status`,
/// so this maps those codes onto the same error classes as HTTP statuses.
///
/// # Errors
///
/// `AuthenticationFailed` for status 401, `RateLimitExceeded` for 601,
/// `ApiError` for any other non-zero status, `InvalidResponse` when the
/// envelope itself is malformed.
pub fn decode_envelope(value: Value) -> ProviderResult<Value> {
    let envelope: Envelope = serde_json::from_value(value).map_err(|e| {
        ProviderError::invalid_response(providers::WITHINGS, format!("bad envelope: {e}"))
    })?;

    let message = || {
        envelope
            .error
            .clone()
            .unwrap_or_else(|| format!("status {}", envelope.status))
    };

    match envelope.status {
        STATUS_OK => Ok(envelope.body.clone()),
        STATUS_INVALID_TOKEN => Err(ProviderError::auth_failed(providers::WITHINGS, message())),
        STATUS_TOO_MANY_REQUESTS => Err(ProviderError::rate_limited(providers::WITHINGS, None)),
        status => Err(ProviderError::ApiError {
            provider: providers::WITHINGS.to_owned(),
            status_code: u16::try_from(status).unwrap_or(u16::MAX),
            message: message(),
            retryable: status == STATUS_UNKNOWN_ERROR,
        }),
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    status: i64,
    #[serde(default)]
    body: Value,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MeasurePage {
    #[serde(default)]
    measuregrps: Vec<Value>,
    #[serde(default)]
    more: Value,
    #[serde(default)]
    offset: Option<i64>,
}

impl MeasurePage {
    fn has_more(&self) -> bool {
        self.more
            .as_i64()
            .map_or_else(|| self.more.as_bool().unwrap_or(false), |n| n != 0)
    }
}

#[derive(Debug, Deserialize)]
struct MeasureGroup {
    grpid: Option<i64>,
    date: Option<i64>,
    #[serde(default)]
    measures: Vec<MeasureEntry>,
}

#[derive(Debug, Deserialize)]
struct MeasureEntry {
    value: i64,
    #[serde(rename = "type")]
    measure_type: i64,
    unit: i32,
}

impl MeasureEntry {
    /// `value * 10^unit`, dividing for negative units to stay exact for decimals
    fn scaled(&self) -> f64 {
        let value = self.value as f64;
        if self.unit < 0 {
            value / 10_f64.powi(-self.unit)
        } else {
            value * 10_f64.powi(self.unit)
        }
    }
}

#[derive(Debug, Deserialize)]
struct SleepPage {
    #[serde(default)]
    series: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct SleepSegment {
    startdate: Option<i64>,
    enddate: Option<i64>,
    state: Option<i64>,
}

/// Adapter for the Withings public API
pub struct WithingsAdapter {
    context: AdapterContext,
    api_base: String,
    rescan_window: Duration,
}

impl WithingsAdapter {
    /// Adapter against the public Withings endpoint
    #[must_use]
    pub fn new(context: AdapterContext) -> Self {
        Self::with_api_base(context, endpoints::WITHINGS_API_BASE)
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

    /// Re-scan at least this much trailing sleep history on every fetch
    ///
    /// Sleep is uploaded when the user wakes, hours after the segments
    /// started, so a window starting at the checkpoint alone misses it.
    #[must_use]
    pub fn with_rescan_window(mut self, window: Duration) -> Self {
        self.rescan_window = window;
        self
    }

    /// Measure groups created or modified at or after `updated_since`
    async fn fetch_measures(
        &self,
        updated_since: DateTime<Utc>,
        batch: &mut FetchBatch,
    ) -> SyncResult<()> {
        let url = format!("{}/measure", self.api_base);
        let mut offset: Option<i64> = None;

        loop {
            let mut form = vec![
                ("action", "getmeas".to_owned()),
                ("category", "1".to_owned()),
                (
                    "meastypes",
                    format!("{MEASURE_TYPE_WEIGHT},{MEASURE_TYPE_HEART_PULSE}"),
                ),
                ("lastupdate", updated_since.timestamp().to_string()),
            ];
            if let Some(offset) = offset {
                form.push(("offset", offset.to_string()));
            }

            let page: MeasurePage = self
                .context
                .post_form(
                    Provider::Withings,
                    "withings.getmeas",
                    &url,
                    &form,
                    decode_body,
                )
                .await?;

            debug!(groups = page.measuregrps.len(), "withings measure page");
            let has_more = page.has_more();
            let next_offset = page.offset;
            for raw in page.measuregrps {
                map_measure_group(raw, batch);
            }

            match (has_more, next_offset) {
                (true, Some(next)) if Some(next) != offset => offset = Some(next),
                _ => return Ok(()),
            }
        }
    }

    async fn fetch_sleep(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        batch: &mut FetchBatch,
    ) -> SyncResult<()> {
        let url = format!("{}/v2/sleep", self.api_base);
        let mut window_start = since;

        while window_start < until {
            let window_end = (window_start + Duration::hours(SLEEP_QUERY_SPAN_HOURS)).min(until);
            let form = [
                ("action", "get".to_owned()),
                ("startdate", window_start.timestamp().to_string()),
                ("enddate", window_end.timestamp().to_string()),
            ];

            let page: SleepPage = self
                .context
                .post_form(
                    Provider::Withings,
                    "withings.sleep",
                    &url,
                    &form,
                    decode_body,
                )
                .await?;

            debug!(segments = page.series.len(), "withings sleep page");
            for raw in page.series {
                map_sleep_segment(raw, batch);
            }
            window_start = window_end;
        }

        Ok(())
    }
}

#[async_trait]
impl DeviceAdapter for WithingsAdapter {
    fn source(&self) -> Source {
        Source::Withings
    }

    async fn fetch_since(&self, since: DateTime<Utc>) -> SyncResult<FetchBatch> {
        let until = Utc::now();
        let mut batch = FetchBatch::new(Source::Withings);

        self.fetch_measures(since, &mut batch).await?;
        let sleep_since = since.min(until - self.rescan_window);
        self.fetch_sleep(sleep_since, until, &mut batch).await?;
        batch.sort_chronologically();

        info!(
            provider = providers::WITHINGS,
            since = %since,
            fetched = batch.measurements.len(),
            rejected = batch.rejected.len(),
            "withings fetch complete"
        );
        Ok(batch)
    }
}

fn decode_body<T: for<'de> Deserialize<'de>>(value: Value) -> ProviderResult<T> {
    let body = decode_envelope(value)?;
    serde_json::from_value(body)
        .map_err(|e| ProviderError::invalid_response(providers::WITHINGS, e.to_string()))
}

fn map_measure_group(raw: Value, batch: &mut FetchBatch) {
    let group: MeasureGroup = match serde_json::from_value(raw) {
        Ok(group) => group,
        Err(e) => {
            batch.reject(ValidationError::new(
                Source::Withings,
                None,
                format!("malformed measure group: {e}"),
            ));
            return;
        }
    };

    let Some(grpid) = group.grpid else {
        batch.reject(ValidationError::new(
            Source::Withings,
            None,
            "measure group without grpid",
        ));
        return;
    };
    let external_id = grpid.to_string();

    let Some(at) = group.date.and_then(|date| DateTime::from_timestamp(date, 0)) else {
        batch.reject(ValidationError::new(
            Source::Withings,
            Some(external_id),
            "measure group without a valid date",
        ));
        return;
    };

    for entry in &group.measures {
        match entry.measure_type {
            MEASURE_TYPE_WEIGHT => batch.accept(Measurement::point(
                Source::Withings,
                external_id.clone(),
                MeasurementValue::Weight {
                    kilograms: entry.scaled(),
                },
                at,
            )),
            MEASURE_TYPE_HEART_PULSE => batch.accept(Measurement::point(
                Source::Withings,
                format!("{external_id}-pulse"),
                MeasurementValue::HeartRate {
                    bpm: saturating_u16(entry.scaled()),
                    activity_level: None,
                },
                at,
            )),
            _ => {}
        }
    }
}

fn map_sleep_segment(raw: Value, batch: &mut FetchBatch) {
    let segment: SleepSegment = match serde_json::from_value(raw) {
        Ok(segment) => segment,
        Err(e) => {
            batch.reject(ValidationError::new(
                Source::Withings,
                None,
                format!("malformed sleep segment: {e}"),
            ));
            return;
        }
    };

    let (Some(start), Some(end)) = (segment.startdate, segment.enddate) else {
        batch.reject(ValidationError::new(
            Source::Withings,
            None,
            "sleep segment without start or end",
        ));
        return;
    };
    let external_id = format!("sleep-{start}-{end}");

    let stage = match segment.state {
        Some(0) => SleepStage::Awake,
        Some(1) => SleepStage::Light,
        Some(2) => SleepStage::Deep,
        Some(3) => SleepStage::Rem,
        other => {
            batch.reject(ValidationError::new(
                Source::Withings,
                Some(external_id),
                format!("unknown sleep state {other:?}"),
            ));
            return;
        }
    };

    let (Some(start_at), Some(end_at)) = (
        DateTime::from_timestamp(start, 0),
        DateTime::from_timestamp(end, 0),
    ) else {
        batch.reject(ValidationError::new(
            Source::Withings,
            Some(external_id),
            "sleep timestamps out of range",
        ));
        return;
    };

    batch.accept(Measurement::interval(
        Source::Withings,
        external_id,
        MeasurementValue::Sleep { stage },
        start_at,
        end_at,
    ));
}
