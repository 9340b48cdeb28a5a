// ABOUTME: Checkpoint table: the last fully synced fetch start per adapter
// ABOUTME: Written by the orchestrator only after a clean adapter run
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use health_sync_core::{Checkpoint, Source, SyncResult};
use sqlx::sqlite::SqliteRow;

use super::{column, parse_column, storage_error, CheckpointStore, Database};

impl Database {
    pub(super) async fn migrate_checkpoints(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS sync_checkpoints (
                source TEXT PRIMARY KEY,
                fetched_through TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn checkpoint_from_row(row: &SqliteRow) -> SyncResult<Checkpoint> {
    Ok(Checkpoint {
        source: parse_column::<Source>(&column::<String>(row, "source")?)?,
        fetched_through: column(row, "fetched_through")?,
    })
}

#[async_trait]
impl CheckpointStore for Database {
    async fn get_checkpoint(&self, source: Source) -> SyncResult<Option<Checkpoint>> {
        let row = sqlx::query(
            "SELECT source, fetched_through FROM sync_checkpoints WHERE source = ?",
        )
        .bind(source.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error("Failed to read checkpoint"))?;

        row.as_ref().map(checkpoint_from_row).transpose()
    }

    async fn put_checkpoint(&self, checkpoint: &Checkpoint) -> SyncResult<()> {
        sqlx::query(
            "INSERT INTO sync_checkpoints (source, fetched_through, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT (source) DO UPDATE SET
                fetched_through = excluded.fetched_through,
                updated_at = excluded.updated_at",
        )
        .bind(checkpoint.source.as_str())
        .bind(checkpoint.fetched_through)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(storage_error("Failed to write checkpoint"))?;
        Ok(())
    }

    async fn list_checkpoints(&self) -> SyncResult<Vec<Checkpoint>> {
        let rows = sqlx::query(
            "SELECT source, fetched_through FROM sync_checkpoints ORDER BY source",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error("Failed to list checkpoints"))?;

        rows.iter().map(checkpoint_from_row).collect()
    }
}
