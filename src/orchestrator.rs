// ABOUTME: Sync orchestrator driving fetch, deduplicate and publish for every device adapter
// ABOUTME: Advances per-adapter checkpoints only after a clean run and reports per-source counts
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use futures_util::future::join_all;
use health_sync_core::constants::defaults;
use health_sync_core::{Checkpoint, ErrorKind, Measurement, Source, SyncResult};
use health_sync_providers::DeviceAdapter;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::calendar::{to_event, CalendarService};
use crate::database::CheckpointStore;
use crate::ledger::DeduplicationLedger;

/// What the orchestrator is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    /// Between cycles
    Idle,
    /// Waiting on adapter fetches
    Fetching,
    /// Checking measurements against the ledger
    Deduplicating,
    /// Creating calendar events
    Publishing,
}

/// Fetch-window tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Window for an adapter that has never completed a cycle
    pub initial_lookback: Duration,
    /// How far before the checkpoint each fetch starts
    pub checkpoint_overlap: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            initial_lookback: Duration::hours(defaults::INITIAL_LOOKBACK_HOURS),
            checkpoint_overlap: Duration::minutes(defaults::CHECKPOINT_OVERLAP_MINS),
        }
    }
}

/// Outcome of one adapter's part of a cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    /// Adapter
    pub source: Source,
    /// Valid measurements fetched
    pub fetched: usize,
    /// Measurements that already had a calendar event
    pub skipped_duplicate: usize,
    /// Measurements that produced a calendar event this cycle
    pub published: usize,
    /// Measurements abandoned this cycle
    pub failed: usize,
    /// Vendor records dropped by validation
    pub invalid: usize,
    /// Adapter-level failure (fetch or checkpoint), if any
    pub error: Option<String>,
    /// Classification of `error`
    pub error_kind: Option<ErrorKind>,
    /// Whether the checkpoint moved forward
    pub checkpoint_advanced: bool,
}

impl SourceReport {
    const fn new(source: Source) -> Self {
        Self {
            source,
            fetched: 0,
            skipped_duplicate: 0,
            published: 0,
            failed: 0,
            invalid: 0,
            error: None,
            error_kind: None,
            checkpoint_advanced: false,
        }
    }
}

/// Outcome of one full cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Cycle start
    pub started_at: DateTime<Utc>,
    /// Cycle end
    pub finished_at: DateTime<Utc>,
    /// Whether shutdown cut the cycle short
    pub interrupted: bool,
    /// One entry per adapter
    pub sources: Vec<SourceReport>,
}

impl CycleReport {
    /// Report for `source`
    #[must_use]
    pub fn source(&self, source: Source) -> Option<&SourceReport> {
        self.sources.iter().find(|report| report.source == source)
    }

    /// Valid measurements fetched across adapters
    #[must_use]
    pub fn fetched(&self) -> usize {
        self.sources.iter().map(|r| r.fetched).sum()
    }

    /// Duplicates skipped across adapters
    #[must_use]
    pub fn skipped_duplicate(&self) -> usize {
        self.sources.iter().map(|r| r.skipped_duplicate).sum()
    }

    /// Events created across adapters
    #[must_use]
    pub fn published(&self) -> usize {
        self.sources.iter().map(|r| r.published).sum()
    }

    /// Measurements abandoned across adapters
    #[must_use]
    pub fn failed(&self) -> usize {
        self.sources.iter().map(|r| r.failed).sum()
    }

    /// Vendor records dropped across adapters
    #[must_use]
    pub fn invalid(&self) -> usize {
        self.sources.iter().map(|r| r.invalid).sum()
    }
}

enum MeasurementOutcome {
    Published,
    Duplicate,
}

/// Top-level sync driver
pub struct SyncOrchestrator {
    adapters: Vec<Arc<dyn DeviceAdapter>>,
    ledger: Arc<DeduplicationLedger>,
    calendar: Arc<dyn CalendarService>,
    checkpoints: Arc<dyn CheckpointStore>,
    settings: OrchestratorSettings,
    phase: watch::Sender<SyncPhase>,
}

impl SyncOrchestrator {
    /// Orchestrator over `adapters`
    #[must_use]
    pub fn new(
        adapters: Vec<Arc<dyn DeviceAdapter>>,
        ledger: Arc<DeduplicationLedger>,
        calendar: Arc<dyn CalendarService>,
        checkpoints: Arc<dyn CheckpointStore>,
        settings: OrchestratorSettings,
    ) -> Self {
        let (phase, _) = watch::channel(SyncPhase::Idle);
        Self {
            adapters,
            ledger,
            calendar,
            checkpoints,
            settings,
            phase,
        }
    }

    /// Observe phase transitions
    ///
    /// Adapters run concurrently, so the phase is the latest transition
    /// made by any of them.
    #[must_use]
    pub fn subscribe_phase(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    fn set_phase(&self, phase: SyncPhase) {
        self.phase.send_if_modified(|current| {
            let changed = *current != phase;
            *current = phase;
            changed
        });
    }

    /// Run one cycle over every adapter
    ///
    /// `shutdown` is checked between measurements. A measurement whose
    /// publish has started is always finished and recorded.
    pub async fn run_cycle(&self, shutdown: &watch::Receiver<bool>) -> CycleReport {
        let started_at = Utc::now();
        self.set_phase(SyncPhase::Fetching);
        info!(adapters = self.adapters.len(), "sync cycle started");

        let runs = self.adapters.iter().map(|adapter| {
            let span = info_span!("adapter", provider = adapter.source().as_str());
            self.sync_adapter(adapter.as_ref(), shutdown).instrument(span)
        });
        let results: Vec<(SourceReport, bool)> = join_all(runs).await;

        let interrupted = results.iter().any(|(_, interrupted)| *interrupted);
        let report = CycleReport {
            started_at,
            finished_at: Utc::now(),
            interrupted,
            sources: results.into_iter().map(|(report, _)| report).collect(),
        };
        self.set_phase(SyncPhase::Idle);

        info!(
            fetched = report.fetched(),
            skipped_duplicate = report.skipped_duplicate(),
            published = report.published(),
            failed = report.failed(),
            invalid = report.invalid(),
            interrupted,
            "sync cycle finished"
        );
        report
    }

    /// Run cycles every `period` until `shutdown` turns true
    pub async fn run_forever(&self, period: StdDuration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let cycle_shutdown = shutdown.clone();

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.run_cycle(&cycle_shutdown).await;
                    if report.interrupted {
                        break;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!("sync loop stopped");
    }

    async fn fetch_start(&self, source: Source, now: DateTime<Utc>) -> SyncResult<DateTime<Utc>> {
        let since = match self.checkpoints.get_checkpoint(source).await? {
            Some(checkpoint) => checkpoint.fetched_through - self.settings.checkpoint_overlap,
            None => {
                debug!("no checkpoint yet, using initial lookback");
                now - self.settings.initial_lookback
            }
        };
        Ok(since)
    }

    /// Returns the adapter report and whether shutdown interrupted it
    async fn sync_adapter(
        &self,
        adapter: &dyn DeviceAdapter,
        shutdown: &watch::Receiver<bool>,
    ) -> (SourceReport, bool) {
        let source = adapter.source();
        let mut report = SourceReport::new(source);
        let fetch_started = Utc::now();

        let batch = match self.fetch_start(source, fetch_started).await {
            Ok(since) => adapter.fetch_since(since).await,
            Err(e) => Err(e),
        };
        let batch = match batch {
            Ok(batch) => batch,
            Err(e) => {
                error!(provider = source.as_str(), error_kind = %e.kind(), error = %e, "fetch failed");
                report.error = Some(e.to_string());
                report.error_kind = Some(e.kind());
                return (report, false);
            }
        };

        report.fetched = batch.measurements.len();
        report.invalid = batch.rejected.len();
        let mut interrupted = false;

        for (index, measurement) in batch.measurements.iter().enumerate() {
            if *shutdown.borrow() {
                info!(remaining = batch.measurements.len() - index, "shutdown requested, stopping");
                interrupted = true;
                break;
            }

            match self.sync_measurement(measurement).await {
                Ok(MeasurementOutcome::Published) => report.published += 1,
                Ok(MeasurementOutcome::Duplicate) => report.skipped_duplicate += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(
                        provider = source.as_str(),
                        key = %measurement.key(),
                        error_kind = %e.kind(),
                        error = %e,
                        "measurement not synced"
                    );
                    if e.is_auth_expired() {
                        let remaining = batch.measurements.len() - index - 1;
                        report.failed += remaining;
                        warn!(remaining, "calendar authorization expired, abandoning batch");
                        report.error = Some(e.to_string());
                        report.error_kind = Some(e.kind());
                        break;
                    }
                }
            }
        }

        if interrupted || report.failed > 0 || report.error.is_some() {
            debug!(
                interrupted,
                failed = report.failed,
                "checkpoint held back"
            );
            return (report, interrupted);
        }

        let checkpoint = Checkpoint {
            source,
            fetched_through: fetch_started,
        };
        match self.checkpoints.put_checkpoint(&checkpoint).await {
            Ok(()) => {
                report.checkpoint_advanced = true;
                debug!(fetched_through = %fetch_started, "checkpoint advanced");
            }
            Err(e) => {
                error!(provider = source.as_str(), error_kind = %e.kind(), error = %e, "checkpoint not saved");
                report.error = Some(e.to_string());
                report.error_kind = Some(e.kind());
            }
        }
        (report, false)
    }

    async fn sync_measurement(&self, measurement: &Measurement) -> SyncResult<MeasurementOutcome> {
        let key = measurement.key();
        let _guard = self.ledger.lock(&key).await;

        self.set_phase(SyncPhase::Deduplicating);
        if !self.ledger.is_new(measurement).await? {
            debug!(key = %key, "already synced");
            return Ok(MeasurementOutcome::Duplicate);
        }

        let event = to_event(measurement);
        self.set_phase(SyncPhase::Publishing);
        let event_id = self.calendar.create_event(&event).await?;
        self.ledger.record(measurement, &event_id).await?;

        info!(key = %key, kind = %measurement.kind(), title = %event.title, "calendar event created");
        Ok(MeasurementOutcome::Published)
    }
}
