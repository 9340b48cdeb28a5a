// ABOUTME: Provider and measurement source identifiers
// ABOUTME: Source names the device vendors, Provider adds the calendar service for tokens
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::providers;

/// Device vendor a measurement came from
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Source {
    /// Withings scales and sleep analyzers
    Withings,
    /// Omron blood pressure monitors
    Omron,
}

impl Source {
    /// All supported device vendors
    pub const ALL: [Self; 2] = [Self::Withings, Self::Omron];

    /// Stable lowercase identifier used for storage and rate-limit keys
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Withings => providers::WITHINGS,
            Self::Omron => providers::OMRON,
        }
    }

    /// Token provider owning this source's credentials
    #[must_use]
    pub const fn provider(self) -> Provider {
        match self {
            Self::Withings => Provider::Withings,
            Self::Omron => Provider::Omron,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Withings => write!(f, "Withings"),
            Self::Omron => write!(f, "Omron"),
        }
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            providers::WITHINGS => Ok(Self::Withings),
            providers::OMRON => Ok(Self::Omron),
            other => Err(format!("unknown measurement source: {other}")),
        }
    }
}

/// Service holding an `OAuth2` token managed by the token lifecycle manager
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Provider {
    /// Withings API
    Withings,
    /// Omron API
    Omron,
    /// Calendar service receiving the events
    Calendar,
}

impl Provider {
    /// All token-bearing providers
    pub const ALL: [Self; 3] = [Self::Withings, Self::Omron, Self::Calendar];

    /// Stable lowercase identifier used for storage and rate-limit keys
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Withings => providers::WITHINGS,
            Self::Omron => providers::OMRON,
            Self::Calendar => providers::CALENDAR,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            providers::WITHINGS => Ok(Self::Withings),
            providers::OMRON => Ok(Self::Omron),
            providers::CALENDAR | "google" => Ok(Self::Calendar),
            other => Err(format!("unknown token provider: {other}")),
        }
    }
}

impl From<Source> for Provider {
    fn from(source: Source) -> Self {
        source.provider()
    }
}
