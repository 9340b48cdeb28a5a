// ABOUTME: Sync record table: one row per measurement that produced a calendar event
// ABOUTME: Insert-if-absent writes keep the first confirmed event id for a key
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use health_sync_core::{MeasurementKey, Source, SyncRecord, SyncResult};

use super::{column, parse_column, storage_error, Database, SyncRecordStore};

impl Database {
    pub(super) async fn migrate_sync_records(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS sync_records (
                source TEXT NOT NULL,
                external_id TEXT NOT NULL,
                calendar_event_id TEXT NOT NULL,
                synced_at TEXT NOT NULL,
                PRIMARY KEY (source, external_id)
            )
            ",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SyncRecordStore for Database {
    async fn get_record(&self, key: &MeasurementKey) -> SyncResult<Option<SyncRecord>> {
        let row = sqlx::query(
            "SELECT source, external_id, calendar_event_id, synced_at
             FROM sync_records WHERE source = ? AND external_id = ?",
        )
        .bind(key.source.as_str())
        .bind(&key.external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error("Failed to read sync record"))?;

        row.map(|row| {
            Ok(SyncRecord {
                measurement_key: MeasurementKey::new(
                    parse_column::<Source>(&column::<String>(&row, "source")?)?,
                    column::<String>(&row, "external_id")?,
                ),
                calendar_event_id: column(&row, "calendar_event_id")?,
                synced_at: column::<DateTime<Utc>>(&row, "synced_at")?,
            })
        })
        .transpose()
    }

    async fn record_exists(&self, key: &MeasurementKey) -> SyncResult<bool> {
        let row = sqlx::query("SELECT 1 FROM sync_records WHERE source = ? AND external_id = ?")
            .bind(key.source.as_str())
            .bind(&key.external_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error("Failed to check sync record"))?;
        Ok(row.is_some())
    }

    async fn put_record(&self, record: &SyncRecord) -> SyncResult<bool> {
        let result = sqlx::query(
            "INSERT INTO sync_records (source, external_id, calendar_event_id, synced_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (source, external_id) DO NOTHING",
        )
        .bind(record.measurement_key.source.as_str())
        .bind(&record.measurement_key.external_id)
        .bind(&record.calendar_event_id)
        .bind(record.synced_at)
        .execute(&self.pool)
        .await
        .map_err(storage_error("Failed to write sync record"))?;
        Ok(result.rows_affected() == 1)
    }

    async fn count_records(&self) -> SyncResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_records")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error("Failed to count sync records"))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}
