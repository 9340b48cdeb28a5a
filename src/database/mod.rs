// ABOUTME: SQLite persistence for sync records, OAuth tokens, and adapter checkpoints
// ABOUTME: Store traits decouple the ledger, token manager and orchestrator from sqlx
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Database Management
//!
//! The only durable state the daemon keeps: one row per synced measurement,
//! one token per provider, and one fetch checkpoint per adapter. Tables are
//! created idempotently on connect.

mod checkpoints;
mod sync_records;
mod tokens;

use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use health_sync_core::{
    Checkpoint, MeasurementKey, Provider, Source, SyncError, SyncRecord, SyncResult, Token,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Decode, Pool, Row, Sqlite, Type};
use tracing::{debug, info};

/// Durable record of which measurements already have a calendar event
#[async_trait]
pub trait SyncRecordStore: Send + Sync {
    /// Record for `key`, if any
    async fn get_record(&self, key: &MeasurementKey) -> SyncResult<Option<SyncRecord>>;

    /// Whether a record exists for `key`
    async fn record_exists(&self, key: &MeasurementKey) -> SyncResult<bool>;

    /// Insert `record` unless one already exists for its key
    ///
    /// Returns `false` when an existing record was kept.
    async fn put_record(&self, record: &SyncRecord) -> SyncResult<bool>;

    /// Number of stored records
    async fn count_records(&self) -> SyncResult<u64>;
}

/// Durable token cache
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Every stored token
    async fn load_tokens(&self) -> SyncResult<Vec<Token>>;

    /// Insert or replace the token for `token.provider`
    async fn save_token(&self, token: &Token) -> SyncResult<()>;

    /// Remove the token for `provider`
    async fn delete_token(&self, provider: Provider) -> SyncResult<()>;
}

/// Durable per-adapter fetch watermark
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Checkpoint for `source`, if one was written
    async fn get_checkpoint(&self, source: Source) -> SyncResult<Option<Checkpoint>>;

    /// Insert or replace the checkpoint for `checkpoint.source`
    async fn put_checkpoint(&self, checkpoint: &Checkpoint) -> SyncResult<()>;

    /// All stored checkpoints
    async fn list_checkpoints(&self) -> SyncResult<Vec<Checkpoint>>;
}

/// `SQLite`-backed implementation of every store
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Connect and run migrations
    ///
    /// The database file and its parent directory are created when missing.
    /// In-memory URLs get a single-connection pool so every query sees the
    /// same database.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the connection fails, or a
    /// migration fails
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {database_url}"))?
            .create_if_missing(true);

        let in_memory = database_url.contains(":memory:");
        if !in_memory {
            if let Some(parent) = options.get_filename().parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await.with_context(|| {
                        format!("Failed to create database directory {}", parent.display())
                    })?;
                }
            }
        }

        let mut pool_options = SqlitePoolOptions::new().max_connections(4);
        if in_memory {
            // closing the only connection would drop the database
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to {database_url}"))?;

        let db = Self { pool };
        db.migrate().await?;
        info!(database_url, "database ready");
        Ok(db)
    }

    /// Get a reference to the database pool for advanced operations
    #[must_use]
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Create every table if missing
    ///
    /// # Errors
    ///
    /// Returns an error if a table cannot be created
    pub async fn migrate(&self) -> Result<()> {
        self.migrate_sync_records().await?;
        self.migrate_tokens().await?;
        self.migrate_checkpoints().await?;
        debug!("database migrations applied");
        Ok(())
    }
}

fn storage_error(action: &str) -> impl Fn(sqlx::Error) -> SyncError + '_ {
    move |e| SyncError::storage(format!("{action}: {e}"))
}

fn parse_column<T: FromStr<Err = String>>(raw: &str) -> SyncResult<T> {
    raw.parse().map_err(SyncError::storage)
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> SyncResult<T>
where
    T: Decode<'r, Sqlite> + Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| SyncError::storage(format!("Failed to decode column {name}: {e}")))
}
