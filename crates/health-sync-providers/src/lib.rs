// ABOUTME: Device adapters and call resilience for the health calendar sync engine
// ABOUTME: Withings/Omron adapters, keyed rate limiter, retry policy, and HTTP transport seam
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Health Sync Providers
//!
//! Everything that talks to a vendor API lives here. Adapters never hold
//! tokens or retry loops themselves: each vendor call goes through
//! [`adapter::AdapterContext`], which asks the [`token_source::TokenSource`]
//! for a valid token, waits on the [`rate_limiter::RateLimiter`] and runs
//! under [`retry::with_retry`].

/// Device adapter trait, fetch batches and the guarded call path
pub mod adapter;
/// Shared HTTP client with configured timeouts
pub mod http_client;
/// Omron blood pressure and heart rate adapter
pub mod omron;
/// Keyed sliding-window rate limiter
pub mod rate_limiter;
/// Bounded exponential backoff
pub mod retry;
/// Valid-token accessor implemented by the token manager
pub mod token_source;
/// HTTP transport trait and `reqwest` implementation
pub mod transport;
/// Withings weight, pulse and sleep adapter
pub mod withings;

pub use adapter::{AdapterContext, DeviceAdapter, FetchBatch};
pub use http_client::{initialize_shared_client, shared_client, HttpClientConfig};
pub use omron::OmronAdapter;
pub use rate_limiter::{RateLimitConfig, RateLimiter};
pub use retry::{with_retry, RetryBackoffConfig};
pub use token_source::TokenSource;
pub use transport::{HttpTransport, VendorTransport};
pub use withings::{decode_envelope, WithingsAdapter};
