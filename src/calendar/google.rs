// ABOUTME: Google Calendar client creating one event per measurement
// ABOUTME: Inserts under the deterministic event id and treats 409 as an already-created event
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use async_trait::async_trait;
use health_sync_core::constants::endpoints;
use health_sync_core::{Provider, ProviderError, SyncError, SyncResult};
use health_sync_providers::AdapterContext;
use reqwest::Url;
use tracing::info;

use super::mapper::EventPayload;

/// HTTP status Google returns when an event id is already taken
const STATUS_CONFLICT: u16 = 409;

/// Destination for calendar events
#[async_trait]
pub trait CalendarService: Send + Sync {
    /// Create `event` and return the id of the confirmed calendar event
    ///
    /// Creating an event whose id already exists must succeed and return
    /// that id.
    ///
    /// # Errors
    ///
    /// `AuthExpired` when the calendar token is unusable, `SyncFailure`
    /// after exhausted retries, `Provider` for other rejections.
    async fn create_event(&self, event: &EventPayload) -> SyncResult<String>;
}

/// [`CalendarService`] backed by the Google Calendar v3 API
pub struct GoogleCalendarClient {
    context: AdapterContext,
    events_url: String,
}

impl GoogleCalendarClient {
    /// Client for `calendar_id` on the public API
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the events URL cannot be built
    pub fn new(context: AdapterContext, calendar_id: &str) -> SyncResult<Self> {
        Self::with_api_base(context, endpoints::GOOGLE_CALENDAR_API_BASE, calendar_id)
    }

    /// Client for `calendar_id` on a custom API base
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `api_base` is not a valid base URL
    pub fn with_api_base(
        context: AdapterContext,
        api_base: &str,
        calendar_id: &str,
    ) -> SyncResult<Self> {
        let mut url = Url::parse(api_base)
            .map_err(|e| SyncError::config(format!("invalid calendar API base {api_base}: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| SyncError::config(format!("calendar API base {api_base} cannot hold a path")))?
            .pop_if_empty()
            .extend(["calendars", calendar_id, "events"]);

        Ok(Self {
            context,
            events_url: url.to_string(),
        })
    }

    /// Full `events.insert` URL
    #[must_use]
    pub fn events_url(&self) -> &str {
        &self.events_url
    }
}

#[async_trait]
impl CalendarService for GoogleCalendarClient {
    async fn create_event(&self, event: &EventPayload) -> SyncResult<String> {
        let body = event.to_google_event();
        match self
            .context
            .post_json(Provider::Calendar, "calendar.insert", &self.events_url, &body)
            .await
        {
            Ok(created) => Ok(created
                .get("id")
                .and_then(|id| id.as_str())
                .map_or_else(|| event.event_id.clone(), str::to_owned)),
            Err(SyncError::Provider(ProviderError::ApiError {
                status_code: STATUS_CONFLICT,
                ..
            })) => {
                info!(event_id = %event.event_id, "calendar event already exists");
                Ok(event.event_id.clone())
            }
            Err(e) => Err(e),
        }
    }
}
