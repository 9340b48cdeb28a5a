// ABOUTME: OAuth token model owned by the token lifecycle manager
// ABOUTME: Expiry checks with a safety margin; secrets are redacted from Debug output
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::provider::Provider;

/// `OAuth2` access/refresh token pair for one provider
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Token {
    /// Provider the token authenticates against
    pub provider: Provider,
    /// Bearer token sent with API calls
    pub access_token: String,
    /// Refresh token used to obtain a new access token
    pub refresh_token: String,
    /// When the access token stops being accepted
    pub expires_at: DateTime<Utc>,
}

impl Token {
    /// True when the token is still valid for at least `margin` after `now`
    #[must_use]
    pub fn is_fresh_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at > now + margin
    }

    /// True when the token is still valid for at least `margin` from now
    #[must_use]
    pub fn is_fresh(&self, margin: Duration) -> bool {
        self.is_fresh_at(Utc::now(), margin)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("provider", &self.provider)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
