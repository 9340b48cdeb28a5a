// ABOUTME: OAuth token lifecycle: cached valid-token accessor plus provider refresh endpoints
// ABOUTME: The manager is the only writer of token state; adapters read through TokenSource
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Cached, per-provider serialized token access and refresh
pub mod manager;
/// Refresh endpoint client for standard `OAuth2` and Withings
pub mod refresh;

pub use manager::TokenManager;
pub use refresh::{OAuthRefreshClient, RefreshEndpoint, RefreshStyle, RefreshedToken, TokenRefresher};
