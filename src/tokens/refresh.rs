// ABOUTME: Token refresh client for the Withings, Omron and Google token endpoints
// ABOUTME: Handles standard OAuth2 form responses and the Withings status envelope
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use health_sync_core::{Provider, ProviderError, ProviderResult, Token};
use health_sync_providers::{decode_envelope, VendorTransport};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::SyncConfig;

/// Lifetime assumed when a token endpoint omits both `expires_in` and `expires_at`
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Result of a successful refresh
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    /// New access token
    pub access_token: String,
    /// Rotated refresh token, when the endpoint issued one
    pub refresh_token: Option<String>,
    /// Expiry of the new access token
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for RefreshedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshedToken")
            .field("access_token", &"[REDACTED]")
            .field("rotated", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Exchanges a refresh token for a new access token
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Refresh `token` against its provider's token endpoint
    ///
    /// # Errors
    ///
    /// A non-retryable error means the endpoint rejected the refresh token.
    async fn refresh(&self, token: &Token) -> ProviderResult<RefreshedToken>;
}

/// Wire dialect of a token endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStyle {
    /// RFC 6749 form post answered by a bare JSON token
    Standard,
    /// Withings `action=requesttoken`, answered inside a `{status, body}` envelope
    WithingsEnvelope,
}

/// Token endpoint registration for one provider
#[derive(Clone)]
pub struct RefreshEndpoint {
    /// Token URL
    pub token_url: String,
    /// Client id
    pub client_id: String,
    /// Client secret
    pub client_secret: String,
    /// Wire dialect
    pub style: RefreshStyle,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
}

/// [`TokenRefresher`] over HTTP
pub struct OAuthRefreshClient {
    transport: Arc<dyn VendorTransport>,
    endpoints: HashMap<Provider, RefreshEndpoint>,
}

impl OAuthRefreshClient {
    /// Client with no registered endpoints
    #[must_use]
    pub fn new(transport: Arc<dyn VendorTransport>) -> Self {
        Self {
            transport,
            endpoints: HashMap::new(),
        }
    }

    /// Client for every provider configured in `config`
    #[must_use]
    pub fn from_config(transport: Arc<dyn VendorTransport>, config: &SyncConfig) -> Self {
        Provider::ALL
            .into_iter()
            .fold(Self::new(transport), |client, provider| {
                let oauth = config.oauth_client(provider);
                let style = if provider == Provider::Withings {
                    RefreshStyle::WithingsEnvelope
                } else {
                    RefreshStyle::Standard
                };
                client.with_endpoint(
                    provider,
                    RefreshEndpoint {
                        token_url: oauth.token_url.clone(),
                        client_id: oauth.client_id.clone(),
                        client_secret: oauth.client_secret.clone(),
                        style,
                    },
                )
            })
    }

    /// Register the endpoint for `provider`
    #[must_use]
    pub fn with_endpoint(mut self, provider: Provider, endpoint: RefreshEndpoint) -> Self {
        self.endpoints.insert(provider, endpoint);
        self
    }
}

#[async_trait]
impl TokenRefresher for OAuthRefreshClient {
    async fn refresh(&self, token: &Token) -> ProviderResult<RefreshedToken> {
        let provider = token.provider;
        let endpoint = self.endpoints.get(&provider).ok_or_else(|| {
            ProviderError::auth_expired(provider.as_str(), "no token endpoint configured")
        })?;

        info!(provider = %provider, "refreshing access token");

        let mut form = vec![
            ("grant_type", "refresh_token".to_owned()),
            ("client_id", endpoint.client_id.clone()),
            ("client_secret", endpoint.client_secret.clone()),
            ("refresh_token", token.refresh_token.clone()),
        ];
        if endpoint.style == RefreshStyle::WithingsEnvelope {
            form.insert(0, ("action", "requesttoken".to_owned()));
        }

        let raw = self
            .transport
            .post_form(provider.as_str(), &endpoint.token_url, None, &form)
            .await?;
        let body = match endpoint.style {
            RefreshStyle::Standard => raw,
            RefreshStyle::WithingsEnvelope => decode_envelope(raw).map_err(refusal)?,
        };

        parse_token_response(provider, body, Utc::now())
    }
}

/// A non-zero, non-retryable Withings status on `requesttoken` refuses the refresh token
fn refusal(error: ProviderError) -> ProviderError {
    match error {
        ProviderError::ApiError {
            provider,
            message,
            retryable: false,
            ..
        } => ProviderError::AuthenticationFailed {
            provider,
            reason: message,
        },
        other => other,
    }
}

fn parse_token_response(
    provider: Provider,
    body: Value,
    now: DateTime<Utc>,
) -> ProviderResult<RefreshedToken> {
    let response: TokenResponse = serde_json::from_value(body).map_err(|e| {
        ProviderError::invalid_response(provider.as_str(), format!("token response: {e}"))
    })?;

    let expires_at = response
        .expires_at
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
        .or_else(|| response.expires_in.map(|secs| now + Duration::seconds(secs)))
        .unwrap_or_else(|| {
            warn!(provider = %provider, "token response without expiry, assuming one hour");
            now + Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS)
        });

    Ok(RefreshedToken {
        access_token: response.access_token,
        refresh_token: response.refresh_token.filter(|t| !t.is_empty()),
        expires_at,
    })
}
