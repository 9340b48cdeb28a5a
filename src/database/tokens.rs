// ABOUTME: OAuth token table: the persisted half of the token lifecycle manager's cache
// ABOUTME: One row per provider, replaced on every refresh or import
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use health_sync_core::{Provider, SyncResult, Token};

use super::{column, parse_column, storage_error, Database, TokenStore};

impl Database {
    pub(super) async fn migrate_tokens(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS oauth_tokens (
                provider TEXT PRIMARY KEY,
                access_token TEXT NOT NULL,
                refresh_token TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for Database {
    async fn load_tokens(&self) -> SyncResult<Vec<Token>> {
        let rows = sqlx::query(
            "SELECT provider, access_token, refresh_token, expires_at FROM oauth_tokens",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error("Failed to load tokens"))?;

        rows.iter()
            .map(|row| {
                Ok(Token {
                    provider: parse_column::<Provider>(&column::<String>(row, "provider")?)?,
                    access_token: column(row, "access_token")?,
                    refresh_token: column(row, "refresh_token")?,
                    expires_at: column(row, "expires_at")?,
                })
            })
            .collect()
    }

    async fn save_token(&self, token: &Token) -> SyncResult<()> {
        sqlx::query(
            "INSERT INTO oauth_tokens (provider, access_token, refresh_token, expires_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (provider) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at",
        )
        .bind(token.provider.as_str())
        .bind(&token.access_token)
        .bind(&token.refresh_token)
        .bind(token.expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(storage_error("Failed to save token"))?;
        Ok(())
    }

    async fn delete_token(&self, provider: Provider) -> SyncResult<()> {
        sqlx::query("DELETE FROM oauth_tokens WHERE provider = ?")
            .bind(provider.as_str())
            .execute(&self.pool)
            .await
            .map_err(storage_error("Failed to delete token"))?;
        Ok(())
    }
}
