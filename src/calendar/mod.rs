// ABOUTME: Calendar side of the sync: measurement-to-event mapping and the Google Calendar client
// ABOUTME: Event ids are derived from the measurement key so publishing is idempotent
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Google Calendar client and the calendar service trait
pub mod google;
/// Pure measurement to event payload mapping
pub mod mapper;

pub use google::{CalendarService, GoogleCalendarClient};
pub use mapper::{event_id, to_event, EventPayload};
