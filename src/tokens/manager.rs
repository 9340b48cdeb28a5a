// ABOUTME: Token lifecycle manager owning the cached OAuth token for each provider
// ABOUTME: Serializes refresh per provider, persists rotations, and invalidates rejected tokens
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use health_sync_core::{ErrorKind, Provider, ProviderError, ProviderResult, SyncError, SyncResult, Token};
use health_sync_providers::{with_retry, RetryBackoffConfig, TokenSource};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::refresh::TokenRefresher;
use crate::database::TokenStore;

/// Hint included in every "no usable token" error
const REIMPORT_HINT: &str = "re-authorize and run `health-calendar-sync import-token`";

/// Owner of every provider's OAuth token
///
/// Each provider's cached token sits behind its own async mutex, held for
/// the whole check-and-refresh sequence. Concurrent callers for the same
/// provider queue on it and observe the refreshed token instead of issuing
/// a second refresh; other providers are never blocked.
pub struct TokenManager {
    store: Arc<dyn TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
    safety_margin: Duration,
    retry: RetryBackoffConfig,
    slots: HashMap<Provider, Mutex<Option<Token>>>,
}

impl TokenManager {
    /// Load every persisted token into the cache
    ///
    /// # Errors
    ///
    /// Returns a storage error if the token table cannot be read
    pub async fn load(
        store: Arc<dyn TokenStore>,
        refresher: Arc<dyn TokenRefresher>,
        safety_margin: Duration,
        retry: RetryBackoffConfig,
    ) -> SyncResult<Self> {
        let mut persisted: HashMap<Provider, Token> = store
            .load_tokens()
            .await?
            .into_iter()
            .map(|token| (token.provider, token))
            .collect();

        let slots = Provider::ALL
            .into_iter()
            .map(|provider| {
                let token = persisted.remove(&provider);
                match &token {
                    Some(token) => debug!(provider = %provider, expires_at = %token.expires_at, "token loaded"),
                    None => warn!(provider = %provider, "no token on file; {REIMPORT_HINT}"),
                }
                (provider, Mutex::new(token))
            })
            .collect();

        Ok(Self {
            store,
            refresher,
            safety_margin,
            retry,
            slots,
        })
    }

    /// Persist and cache an externally obtained token
    ///
    /// # Errors
    ///
    /// Returns a storage error if the token cannot be written
    pub async fn install(&self, token: Token) -> SyncResult<()> {
        let slot = self.slot(token.provider).map_err(SyncError::from)?;
        let mut cached = slot.lock().await;
        self.store.save_token(&token).await?;
        info!(provider = %token.provider, expires_at = %token.expires_at, "token installed");
        *cached = Some(token);
        Ok(())
    }

    /// Drop the token for `provider` from cache and store
    ///
    /// # Errors
    ///
    /// Returns a storage error if the row cannot be deleted
    pub async fn invalidate(&self, provider: Provider) -> SyncResult<()> {
        let slot = self.slot(provider).map_err(SyncError::from)?;
        let mut cached = slot.lock().await;
        self.invalidate_locked(provider, &mut cached).await
    }

    /// Cached token for `provider`, without refreshing
    pub async fn cached(&self, provider: Provider) -> Option<Token> {
        match self.slot(provider) {
            Ok(slot) => slot.lock().await.clone(),
            Err(_) => None,
        }
    }

    fn slot(&self, provider: Provider) -> ProviderResult<&Mutex<Option<Token>>> {
        self.slots
            .get(&provider)
            .ok_or_else(|| ProviderError::auth_expired(provider.as_str(), "unknown provider"))
    }

    async fn invalidate_locked(
        &self,
        provider: Provider,
        cached: &mut Option<Token>,
    ) -> SyncResult<()> {
        *cached = None;
        self.store.delete_token(provider).await?;
        warn!(provider = %provider, "token invalidated; {REIMPORT_HINT}");
        Ok(())
    }

    async fn refresh_locked(
        &self,
        provider: Provider,
        current: Token,
        cached: &mut Option<Token>,
    ) -> ProviderResult<Token> {
        let refresher = &self.refresher;
        let stale = &current;
        let outcome = with_retry(&self.retry, "token.refresh", move || refresher.refresh(stale)).await;

        match outcome {
            Ok(refreshed) => {
                let token = Token {
                    provider,
                    access_token: refreshed.access_token,
                    refresh_token: refreshed
                        .refresh_token
                        .unwrap_or_else(|| current.refresh_token.clone()),
                    expires_at: refreshed.expires_at,
                };
                if let Err(e) = self.store.save_token(&token).await {
                    warn!(
                        provider = %provider,
                        error_kind = %e.kind(),
                        error = %e,
                        "refreshed token not persisted; using it for this run"
                    );
                }
                info!(provider = %provider, expires_at = %token.expires_at, "access token refreshed");
                *cached = Some(token.clone());
                Ok(token)
            }
            Err(SyncError::Provider(rejection)) if is_rejection(&rejection) => {
                error!(
                    provider = %provider,
                    error_kind = %ErrorKind::AuthExpired,
                    error = %rejection,
                    "refresh token rejected"
                );
                if let Err(e) = self.invalidate_locked(provider, cached).await {
                    warn!(provider = %provider, error = %e, "failed to delete rejected token");
                }
                Err(ProviderError::auth_expired(
                    provider.as_str(),
                    format!("refresh rejected ({rejection}); {REIMPORT_HINT}"),
                ))
            }
            Err(e) => {
                error!(
                    provider = %provider,
                    error_kind = %ErrorKind::AuthExpired,
                    error = %e,
                    "token refresh failed"
                );
                Err(ProviderError::auth_expired(
                    provider.as_str(),
                    format!("refresh failed: {e}"),
                ))
            }
        }
    }
}

/// Whether the token endpoint refused the refresh token itself
fn is_rejection(error: &ProviderError) -> bool {
    match error {
        ProviderError::AuthenticationFailed { .. } => true,
        ProviderError::ApiError { status_code, .. } => matches!(status_code, 400 | 401 | 403),
        _ => false,
    }
}

#[async_trait]
impl TokenSource for TokenManager {
    async fn get_valid_token(&self, provider: Provider) -> ProviderResult<Token> {
        let slot = self.slot(provider)?;
        let mut cached = slot.lock().await;

        let Some(current) = cached.clone() else {
            return Err(ProviderError::auth_expired(
                provider.as_str(),
                format!("no token on file; {REIMPORT_HINT}"),
            ));
        };

        if current.is_fresh(self.safety_margin) {
            return Ok(current);
        }

        debug!(provider = %provider, expires_at = %current.expires_at, "token inside safety margin");
        self.refresh_locked(provider, current, &mut cached).await
    }
}
