// ABOUTME: Deduplication ledger deciding whether a measurement still needs a calendar event
// ABOUTME: Per-key async locks serialize check, publish and record for one measurement
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use health_sync_core::{Measurement, MeasurementKey, SyncRecord, SyncResult};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::database::SyncRecordStore;

/// Lock table size above which idle entries are pruned
const LOCK_TABLE_PRUNE_THRESHOLD: usize = 1024;

/// Tracks which measurements already have a calendar event
pub struct DeduplicationLedger {
    store: Arc<dyn SyncRecordStore>,
    locks: DashMap<MeasurementKey, Arc<Mutex<()>>>,
}

impl DeduplicationLedger {
    /// Ledger over `store`
    #[must_use]
    pub fn new(store: Arc<dyn SyncRecordStore>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
        }
    }

    /// Exclusive access to `key` until the guard is dropped
    ///
    /// Hold it across `is_new`, the calendar call and `record` so two
    /// workers can never publish the same measurement.
    pub async fn lock(&self, key: &MeasurementKey) -> OwnedMutexGuard<()> {
        if self.locks.len() > LOCK_TABLE_PRUNE_THRESHOLD {
            self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        let lock = Arc::clone(
            self.locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        lock.lock_owned().await
    }

    /// False when a sync record already exists for the measurement's key
    ///
    /// # Errors
    ///
    /// Returns a storage error if the record table cannot be read
    pub async fn is_new(&self, measurement: &Measurement) -> SyncResult<bool> {
        Ok(!self.store.record_exists(&measurement.key()).await?)
    }

    /// Record that `measurement` produced `calendar_event_id`
    ///
    /// Call only after the calendar confirmed the event. An existing record
    /// is never overwritten; it is returned instead.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the record cannot be written or read back
    pub async fn record(
        &self,
        measurement: &Measurement,
        calendar_event_id: &str,
    ) -> SyncResult<SyncRecord> {
        let record = SyncRecord {
            measurement_key: measurement.key(),
            calendar_event_id: calendar_event_id.to_owned(),
            synced_at: Utc::now(),
        };

        if self.store.put_record(&record).await? {
            debug!(key = %record.measurement_key, event_id = calendar_event_id, "sync record written");
            return Ok(record);
        }

        warn!(key = %record.measurement_key, "sync record already present; keeping the original");
        Ok(self
            .store
            .get_record(&record.measurement_key)
            .await?
            .unwrap_or(record))
    }

    /// Stored record for `key`
    ///
    /// # Errors
    ///
    /// Returns a storage error if the record table cannot be read
    pub async fn lookup(&self, key: &MeasurementKey) -> SyncResult<Option<SyncRecord>> {
        self.store.get_record(key).await
    }
}
