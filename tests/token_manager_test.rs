// ABOUTME: Tests for the token manager and the OAuth refresh client
// ABOUTME: Covers freshness, refresh persistence, rejection handling and single-flight refresh
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use common::{create_test_database, fast_retry, token, FakeRefresher, ScriptedTransport};
use health_calendar_sync::database::{Database, TokenStore};
use health_calendar_sync::tokens::{
    OAuthRefreshClient, RefreshEndpoint, RefreshStyle, RefreshedToken, TokenManager,
    TokenRefresher,
};
use health_sync_core::{Provider, ProviderError};
use health_sync_providers::{TokenSource, VendorTransport};
use serde_json::json;

async fn manager_with(
    database: &Arc<Database>,
    refresher: &Arc<FakeRefresher>,
) -> TokenManager {
    TokenManager::load(
        Arc::clone(database) as Arc<dyn TokenStore>,
        Arc::clone(refresher) as Arc<dyn TokenRefresher>,
        Duration::minutes(5),
        fast_retry(3),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_fresh_token_is_returned_without_refresh() {
    let database = create_test_database().await;
    database
        .save_token(&token(Provider::Withings, "fresh", Duration::hours(2)))
        .await
        .unwrap();
    let refresher = FakeRefresher::new();
    let manager = manager_with(&database, &refresher).await;

    let current = manager.get_valid_token(Provider::Withings).await.unwrap();

    assert_eq!(current.access_token, "fresh");
    assert_eq!(refresher.calls(), 0);
}

#[tokio::test]
async fn test_token_inside_safety_margin_is_refreshed_and_persisted() {
    let database = create_test_database().await;
    database
        .save_token(&token(Provider::Omron, "stale", Duration::minutes(2)))
        .await
        .unwrap();
    let refresher = FakeRefresher::new();
    let manager = manager_with(&database, &refresher).await;

    let current = manager.get_valid_token(Provider::Omron).await.unwrap();

    assert_eq!(refresher.calls(), 1);
    assert_eq!(current.access_token, "omron-access-1");
    assert_eq!(current.refresh_token, "omron-refresh-1");
    assert!(current.expires_at > Utc::now() + Duration::minutes(50));

    let stored = database.load_tokens().await.unwrap();
    let stored = stored.iter().find(|t| t.provider == Provider::Omron).unwrap();
    assert_eq!(stored.access_token, current.access_token);
    assert_eq!(stored.refresh_token, current.refresh_token);
    assert!((stored.expires_at - current.expires_at).num_seconds().abs() < 1);
    assert_eq!(manager.cached(Provider::Omron).await, Some(current));
}

#[tokio::test]
async fn test_refresh_without_rotation_keeps_refresh_token() {
    let database = create_test_database().await;
    database
        .save_token(&token(Provider::Calendar, "old", Duration::seconds(-10)))
        .await
        .unwrap();
    let refresher = FakeRefresher::new();
    refresher.push(Ok(RefreshedToken {
        access_token: "new".to_owned(),
        refresh_token: None,
        expires_at: Utc::now() + Duration::hours(1),
    }));
    let manager = manager_with(&database, &refresher).await;

    let current = manager.get_valid_token(Provider::Calendar).await.unwrap();

    assert_eq!(current.access_token, "new");
    assert_eq!(current.refresh_token, "old-refresh");
}

#[tokio::test]
async fn test_rejected_refresh_expires_authorization_and_deletes_token() {
    let database = create_test_database().await;
    database
        .save_token(&token(Provider::Withings, "stale", Duration::seconds(-1)))
        .await
        .unwrap();
    let refresher = FakeRefresher::new();
    refresher.push(Err(ProviderError::api("withings", 400, "invalid_grant")));
    let manager = manager_with(&database, &refresher).await;

    let err = manager.get_valid_token(Provider::Withings).await.unwrap_err();
    assert!(matches!(err, ProviderError::AuthExpired { .. }));
    assert_eq!(refresher.calls(), 1);
    assert!(database.load_tokens().await.unwrap().is_empty());
    assert_eq!(manager.cached(Provider::Withings).await, None);

    // with nothing on file the next call fails without touching the endpoint
    let err = manager.get_valid_token(Provider::Withings).await.unwrap_err();
    assert!(matches!(err, ProviderError::AuthExpired { .. }));
    assert_eq!(refresher.calls(), 1);
}

#[tokio::test]
async fn test_transient_refresh_failure_keeps_token_on_file() {
    let database = create_test_database().await;
    database
        .save_token(&token(Provider::Omron, "stale", Duration::seconds(-1)))
        .await
        .unwrap();
    let refresher = FakeRefresher::new();
    for _ in 0..3 {
        refresher.push(Err(ProviderError::network("omron", "connection refused")));
    }
    let manager = manager_with(&database, &refresher).await;

    let err = manager.get_valid_token(Provider::Omron).await.unwrap_err();

    assert!(matches!(err, ProviderError::AuthExpired { .. }));
    assert_eq!(refresher.calls(), 3);
    assert_eq!(database.load_tokens().await.unwrap().len(), 1);
    assert!(manager.cached(Provider::Omron).await.is_some());
}

#[tokio::test]
async fn test_transient_refresh_failure_recovers_on_retry() {
    let database = create_test_database().await;
    database
        .save_token(&token(Provider::Omron, "stale", Duration::seconds(-1)))
        .await
        .unwrap();
    let refresher = FakeRefresher::new();
    refresher.push(Err(ProviderError::api("omron", 502, "bad gateway")));
    let manager = manager_with(&database, &refresher).await;

    let current = manager.get_valid_token(Provider::Omron).await.unwrap();

    assert_eq!(refresher.calls(), 2);
    assert_eq!(current.access_token, "omron-access-2");
}

#[tokio::test]
async fn test_missing_token_is_auth_expired() {
    let database = create_test_database().await;
    let refresher = FakeRefresher::new();
    let manager = manager_with(&database, &refresher).await;

    let err = manager.get_valid_token(Provider::Calendar).await.unwrap_err();

    assert!(matches!(err, ProviderError::AuthExpired { .. }));
    assert!(err.to_string().contains("import-token"));
}

#[tokio::test]
async fn test_concurrent_callers_share_one_refresh() {
    let database = create_test_database().await;
    database
        .save_token(&token(Provider::Withings, "stale", Duration::seconds(-1)))
        .await
        .unwrap();
    let refresher = FakeRefresher::slow(StdDuration::from_millis(50));
    let manager = Arc::new(manager_with(&database, &refresher).await);

    let mut handles = Vec::new();
    for _ in 0..10 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move {
            manager.get_valid_token(Provider::Withings).await
        }));
    }

    for handle in handles {
        let current = handle.await.unwrap().unwrap();
        assert_eq!(current.access_token, "withings-access-1");
    }
    assert_eq!(refresher.calls(), 1);
}

#[tokio::test]
async fn test_install_persists_and_caches() {
    let database = create_test_database().await;
    let refresher = FakeRefresher::new();
    let manager = manager_with(&database, &refresher).await;

    manager
        .install(token(Provider::Calendar, "imported", Duration::hours(1)))
        .await
        .unwrap();

    assert_eq!(
        manager.get_valid_token(Provider::Calendar).await.unwrap().access_token,
        "imported"
    );
    let reloaded = manager_with(&database, &refresher).await;
    assert_eq!(
        reloaded.cached(Provider::Calendar).await.unwrap().access_token,
        "imported"
    );
}

// ============================================================================
// OAuth refresh client
// ============================================================================

fn endpoint(style: RefreshStyle) -> RefreshEndpoint {
    RefreshEndpoint {
        token_url: "https://auth.test/oauth2/token".to_owned(),
        client_id: "client".to_owned(),
        client_secret: "secret".to_owned(),
        style,
    }
}

#[tokio::test]
async fn test_standard_refresh_posts_refresh_grant() {
    let transport = ScriptedTransport::new();
    transport.respond(
        "/oauth2/token",
        Ok(json!({ "access_token": "a2", "refresh_token": "r2", "expires_in": 3599 })),
    );
    let client = OAuthRefreshClient::new(Arc::clone(&transport) as Arc<dyn VendorTransport>)
        .with_endpoint(Provider::Calendar, endpoint(RefreshStyle::Standard));

    let before = Utc::now();
    let refreshed = client
        .refresh(&token(Provider::Calendar, "a1", Duration::zero()))
        .await
        .unwrap();

    assert_eq!(refreshed.access_token, "a2");
    assert_eq!(refreshed.refresh_token.as_deref(), Some("r2"));
    assert!(refreshed.expires_at >= before + Duration::seconds(3599));

    let call = &transport.calls()[0];
    assert_eq!(call.bearer, None);
    assert_eq!(call.param("grant_type"), Some("refresh_token"));
    assert_eq!(call.param("refresh_token"), Some("a1-refresh"));
    assert_eq!(call.param("client_id"), Some("client"));
    assert_eq!(call.param("action"), None);
}

#[tokio::test]
async fn test_withings_refresh_unwraps_envelope() {
    let transport = ScriptedTransport::new();
    transport.respond(
        "/oauth2/token",
        Ok(json!({
            "status": 0,
            "body": { "access_token": "wa2", "refresh_token": "wr2", "expires_in": 10800 }
        })),
    );
    let client = OAuthRefreshClient::new(Arc::clone(&transport) as Arc<dyn VendorTransport>)
        .with_endpoint(Provider::Withings, endpoint(RefreshStyle::WithingsEnvelope));

    let refreshed = client
        .refresh(&token(Provider::Withings, "wa1", Duration::zero()))
        .await
        .unwrap();

    assert_eq!(refreshed.access_token, "wa2");
    assert_eq!(transport.calls()[0].param("action"), Some("requesttoken"));
}

#[tokio::test]
async fn test_withings_refusal_is_authentication_failure() {
    let transport = ScriptedTransport::new();
    transport.respond(
        "/oauth2/token",
        Ok(json!({ "status": 503, "error": "invalid refresh_token" })),
    );
    let client = OAuthRefreshClient::new(Arc::clone(&transport) as Arc<dyn VendorTransport>)
        .with_endpoint(Provider::Withings, endpoint(RefreshStyle::WithingsEnvelope));

    let err = client
        .refresh(&token(Provider::Withings, "wa1", Duration::zero()))
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::AuthenticationFailed { .. }));
}

#[tokio::test]
async fn test_unregistered_provider_cannot_refresh() {
    let client = OAuthRefreshClient::new(ScriptedTransport::new());

    let err = client
        .refresh(&token(Provider::Omron, "o1", Duration::zero()))
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::AuthExpired { .. }));
}
