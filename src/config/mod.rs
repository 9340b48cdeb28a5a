// ABOUTME: Configuration module for the health calendar sync daemon
// ABOUTME: Environment-driven settings for credentials, endpoints, and engine tuning
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Configuration module
//!
//! All settings come from environment variables, optionally seeded from a
//! `.env` file. See [`environment::SyncConfig::from_env`].

/// Environment variable loading and validation
pub mod environment;

pub use environment::{OAuthClientConfig, SyncConfig};
