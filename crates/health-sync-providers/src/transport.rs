// ABOUTME: HTTP transport seam between adapters/clients and the network
// ABOUTME: Maps HTTP outcomes onto ProviderError so retry classification lives in one place
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use async_trait::async_trait;
use health_sync_core::{ProviderError, ProviderResult};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::http_client::shared_client;

/// Longest response body excerpt kept in an error message
const ERROR_BODY_EXCERPT: usize = 512;

/// Outbound JSON-over-HTTP calls
///
/// Every method returns the decoded JSON body on a 2xx response. Non-success
/// statuses are classified: 429 becomes `RateLimitExceeded` (with the
/// `Retry-After` hint), 401/403 `AuthenticationFailed`, anything else
/// `ApiError` (retryable for 5xx). Connection failures and timeouts are
/// `Network` errors.
#[async_trait]
pub trait VendorTransport: Send + Sync {
    /// `GET url?query` with a bearer token
    async fn get_json(
        &self,
        provider: &str,
        url: &str,
        bearer: &str,
        query: &[(&str, String)],
    ) -> ProviderResult<Value>;

    /// `POST url` with a form body, optionally authenticated
    async fn post_form(
        &self,
        provider: &str,
        url: &str,
        bearer: Option<&str>,
        form: &[(&str, String)],
    ) -> ProviderResult<Value>;

    /// `POST url` with a JSON body and a bearer token
    async fn post_json(
        &self,
        provider: &str,
        url: &str,
        bearer: &str,
        body: &Value,
    ) -> ProviderResult<Value>;
}

/// `reqwest` implementation of [`VendorTransport`]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Transport over the process-wide shared client
    #[must_use]
    pub fn shared() -> Self {
        Self {
            client: shared_client().clone(),
        }
    }

    /// Transport over a caller-supplied client
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn send(&self, provider: &str, request: RequestBuilder) -> ProviderResult<Value> {
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::network(provider, describe(&e)))?;
        decode(provider, response).await
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::shared()
    }
}

#[async_trait]
impl VendorTransport for HttpTransport {
    async fn get_json(
        &self,
        provider: &str,
        url: &str,
        bearer: &str,
        query: &[(&str, String)],
    ) -> ProviderResult<Value> {
        debug!(provider, url, "GET");
        let request = self.client.get(url).bearer_auth(bearer).query(query);
        self.send(provider, request).await
    }

    async fn post_form(
        &self,
        provider: &str,
        url: &str,
        bearer: Option<&str>,
        form: &[(&str, String)],
    ) -> ProviderResult<Value> {
        debug!(provider, url, "POST form");
        let mut request = self.client.post(url).form(form);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        self.send(provider, request).await
    }

    async fn post_json(
        &self,
        provider: &str,
        url: &str,
        bearer: &str,
        body: &Value,
    ) -> ProviderResult<Value> {
        debug!(provider, url, "POST json");
        let request = self.client.post(url).bearer_auth(bearer).json(body);
        self.send(provider, request).await
    }
}

async fn decode(provider: &str, response: Response) -> ProviderResult<Value> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());
        return Err(ProviderError::rate_limited(provider, retry_after_secs));
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = excerpt(&body);
        return Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ProviderError::auth_failed(provider, message)
            }
            _ => ProviderError::api(provider, status.as_u16(), message),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ProviderError::network(provider, describe(&e)))?;
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes)
        .map_err(|e| ProviderError::invalid_response(provider, format!("body is not JSON: {e}")))
}

fn describe(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("request timed out: {error}")
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else {
        error.to_string()
    }
}

fn excerpt(body: &str) -> String {
    if body.len() <= ERROR_BODY_EXCERPT {
        return body.to_owned();
    }
    let mut end = ERROR_BODY_EXCERPT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
