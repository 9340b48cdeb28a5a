// ABOUTME: Read-only token accessor handed to adapters and the calendar client
// ABOUTME: Implemented by the token lifecycle manager; adapters never touch the token store
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use async_trait::async_trait;
use health_sync_core::{Provider, ProviderResult, Token};

/// Source of valid access tokens
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Token for `provider` that stays valid for at least the configured margin
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::AuthExpired` when no usable token can be
    /// produced; callers must not retry that error.
    async fn get_valid_token(&self, provider: Provider) -> ProviderResult<Token>;
}
