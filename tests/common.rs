// ABOUTME: Shared fakes and fixtures for integration tests
// ABOUTME: Scripted HTTP transport, token source, calendar, adapter, refresher and databases
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    missing_docs,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use health_calendar_sync::calendar::{CalendarService, EventPayload};
use health_calendar_sync::database::{Database, SyncRecordStore};
use health_calendar_sync::tokens::{RefreshedToken, TokenRefresher};
use health_sync_core::{
    Measurement, MeasurementKey, MeasurementValue, Provider, ProviderError, ProviderResult,
    Source, SyncError, SyncRecord, SyncResult, Token,
};
use health_sync_providers::{
    AdapterContext, DeviceAdapter, FetchBatch, RateLimiter, RetryBackoffConfig, TokenSource,
    VendorTransport,
};
use serde_json::Value;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet test logging once per test binary
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// In-memory database with every table created
pub async fn create_test_database() -> Arc<Database> {
    init_test_logging();
    Arc::new(Database::new("sqlite::memory:").await.unwrap())
}

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap()
}

pub fn weight(external_id: &str, kilograms: f64) -> Measurement {
    Measurement::point(
        Source::Withings,
        external_id,
        MeasurementValue::Weight { kilograms },
        at(1_700_000_000),
    )
}

pub fn blood_pressure(external_id: &str, systolic: u16, diastolic: u16) -> Measurement {
    Measurement::point(
        Source::Omron,
        external_id,
        MeasurementValue::BloodPressure {
            systolic_mmhg: systolic,
            diastolic_mmhg: diastolic,
            pulse_bpm: None,
            irregular_heartbeat: false,
        },
        at(1_700_000_600),
    )
}

pub fn batch(source: Source, measurements: Vec<Measurement>) -> FetchBatch {
    FetchBatch {
        source,
        measurements,
        rejected: Vec::new(),
    }
}

pub fn token(provider: Provider, access: &str, expires_in: Duration) -> Token {
    Token {
        provider,
        access_token: access.to_owned(),
        refresh_token: format!("{access}-refresh"),
        expires_at: Utc::now() + expires_in,
    }
}

/// Retry contract with tiny delays and no jitter
pub fn fast_retry(max_attempts: u32) -> RetryBackoffConfig {
    RetryBackoffConfig::new(max_attempts, StdDuration::from_millis(1))
}

// ============================================================================
// Scripted transport
// ============================================================================

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: &'static str,
    pub url: String,
    pub bearer: Option<String>,
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RecordedCall {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Transport answering from per-route queues; the last queued answer repeats
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<(String, VecDeque<ProviderResult<Value>>)>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue an answer for any URL containing `route`
    pub fn respond(&self, route: &str, response: ProviderResult<Value>) {
        let mut routes = self.routes.lock().unwrap();
        if let Some((_, queue)) = routes.iter_mut().find(|(r, _)| r == route) {
            queue.push_back(response);
        } else {
            routes.push((route.to_owned(), VecDeque::from([response])));
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, route: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.url.contains(route))
            .collect()
    }

    fn answer(&self, call: RecordedCall) -> ProviderResult<Value> {
        let url = call.url.clone();
        self.calls.lock().unwrap().push(call);

        let mut routes = self.routes.lock().unwrap();
        let Some((_, queue)) = routes.iter_mut().find(|(route, _)| url.contains(route.as_str()))
        else {
            return Err(ProviderError::api("test", 404, format!("no route for {url}")));
        };
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        }
    }
}

fn owned_params(params: &[(&str, String)]) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(k, v)| ((*k).to_owned(), v.clone()))
        .collect()
}

#[async_trait]
impl VendorTransport for ScriptedTransport {
    async fn get_json(
        &self,
        _provider: &str,
        url: &str,
        bearer: &str,
        query: &[(&str, String)],
    ) -> ProviderResult<Value> {
        self.answer(RecordedCall {
            method: "GET",
            url: url.to_owned(),
            bearer: Some(bearer.to_owned()),
            params: owned_params(query),
            body: None,
        })
    }

    async fn post_form(
        &self,
        _provider: &str,
        url: &str,
        bearer: Option<&str>,
        form: &[(&str, String)],
    ) -> ProviderResult<Value> {
        self.answer(RecordedCall {
            method: "POST",
            url: url.to_owned(),
            bearer: bearer.map(str::to_owned),
            params: owned_params(form),
            body: None,
        })
    }

    async fn post_json(
        &self,
        _provider: &str,
        url: &str,
        bearer: &str,
        body: &Value,
    ) -> ProviderResult<Value> {
        self.answer(RecordedCall {
            method: "POST",
            url: url.to_owned(),
            bearer: Some(bearer.to_owned()),
            params: Vec::new(),
            body: Some(body.clone()),
        })
    }
}

// ============================================================================
// Token source
// ============================================================================

/// Token source handing out long-lived tokens, except for expired providers
#[derive(Default)]
pub struct StaticTokens {
    expired: Mutex<HashSet<Provider>>,
    requests: AtomicUsize,
}

impl StaticTokens {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn expire(&self, provider: Provider) {
        self.expired.lock().unwrap().insert(provider);
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenSource for StaticTokens {
    async fn get_valid_token(&self, provider: Provider) -> ProviderResult<Token> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.expired.lock().unwrap().contains(&provider) {
            return Err(ProviderError::auth_expired(provider.as_str(), "refresh rejected"));
        }
        Ok(token(provider, &format!("{}-access", provider.as_str()), Duration::days(1)))
    }
}

pub fn adapter_context(
    tokens: Arc<StaticTokens>,
    transport: Arc<ScriptedTransport>,
    retry: RetryBackoffConfig,
) -> AdapterContext {
    AdapterContext::new(tokens, Arc::new(RateLimiter::default()), retry, transport)
}

// ============================================================================
// Calendar
// ============================================================================

/// Calendar that stores events by id and treats a repeated id as already created
#[derive(Default)]
pub struct FakeCalendar {
    events: Mutex<HashMap<String, EventPayload>>,
    order: Mutex<Vec<String>>,
    failures: Mutex<VecDeque<SyncError>>,
    calls: AtomicUsize,
}

impl FakeCalendar {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next(&self, error: SyncError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn titles(&self) -> Vec<String> {
        let events = self.events.lock().unwrap();
        self.order
            .lock()
            .unwrap()
            .iter()
            .map(|id| events[id].title.clone())
            .collect()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CalendarService for FakeCalendar {
    async fn create_event(&self, event: &EventPayload) -> SyncResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        let mut events = self.events.lock().unwrap();
        if !events.contains_key(&event.event_id) {
            events.insert(event.event_id.clone(), event.clone());
            self.order.lock().unwrap().push(event.event_id.clone());
        }
        Ok(event.event_id.clone())
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// Adapter replaying queued fetch results and recording each `since`
pub struct FakeAdapter {
    source: Source,
    results: Mutex<VecDeque<SyncResult<FetchBatch>>>,
    since: Mutex<Vec<DateTime<Utc>>>,
}

impl FakeAdapter {
    pub fn new(source: Source) -> Arc<Self> {
        Arc::new(Self {
            source,
            results: Mutex::new(VecDeque::new()),
            since: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, result: SyncResult<FetchBatch>) {
        self.results.lock().unwrap().push_back(result);
    }

    pub fn push_measurements(&self, measurements: Vec<Measurement>) {
        self.push(Ok(batch(self.source, measurements)));
    }

    pub fn since_calls(&self) -> Vec<DateTime<Utc>> {
        self.since.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeviceAdapter for FakeAdapter {
    fn source(&self) -> Source {
        self.source
    }

    async fn fetch_since(&self, since: DateTime<Utc>) -> SyncResult<FetchBatch> {
        self.since.lock().unwrap().push(since);
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(FetchBatch::new(self.source)))
    }
}

// ============================================================================
// Refresher
// ============================================================================

/// Refresher replaying queued outcomes; defaults to a fresh one-hour token
#[derive(Default)]
pub struct FakeRefresher {
    outcomes: Mutex<VecDeque<ProviderResult<RefreshedToken>>>,
    calls: AtomicUsize,
    delay: Option<StdDuration>,
}

impl FakeRefresher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn slow(delay: StdDuration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn push(&self, outcome: ProviderResult<RefreshedToken>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefresher for FakeRefresher {
    async fn refresh(&self, token: &Token) -> ProviderResult<RefreshedToken> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let queued = self.outcomes.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| {
            Ok(RefreshedToken {
                access_token: format!("{}-access-{call}", token.provider.as_str()),
                refresh_token: Some(format!("{}-refresh-{call}", token.provider.as_str())),
                expires_at: Utc::now() + Duration::hours(1),
            })
        })
    }
}

// ============================================================================
// Record store that fails writes
// ============================================================================

/// Record store whose first `failures` writes fail, simulating a crash after publish
pub struct FlakyRecordStore {
    inner: Arc<Database>,
    failures: AtomicUsize,
}

impl FlakyRecordStore {
    pub fn new(inner: Arc<Database>, failures: usize) -> Arc<Self> {
        Arc::new(Self {
            inner,
            failures: AtomicUsize::new(failures),
        })
    }
}

#[async_trait]
impl SyncRecordStore for FlakyRecordStore {
    async fn get_record(&self, key: &MeasurementKey) -> SyncResult<Option<SyncRecord>> {
        self.inner.get_record(key).await
    }

    async fn record_exists(&self, key: &MeasurementKey) -> SyncResult<bool> {
        self.inner.record_exists(key).await
    }

    async fn put_record(&self, record: &SyncRecord) -> SyncResult<bool> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(SyncError::storage("simulated crash before record"));
        }
        self.inner.put_record(record).await
    }

    async fn count_records(&self) -> SyncResult<u64> {
        self.inner.count_records().await
    }
}
