// ABOUTME: Wires configuration into the database, token manager, adapters, calendar and orchestrator
// ABOUTME: Shared by the binary's subcommands so every entry point builds the same graph
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;

use anyhow::{Context, Result};
use health_sync_providers::{
    initialize_shared_client, AdapterContext, DeviceAdapter, HttpTransport, OmronAdapter,
    RateLimiter, TokenSource, VendorTransport, WithingsAdapter,
};

use crate::calendar::GoogleCalendarClient;
use crate::config::SyncConfig;
use crate::database::{CheckpointStore, Database, SyncRecordStore, TokenStore};
use crate::ledger::DeduplicationLedger;
use crate::orchestrator::{OrchestratorSettings, SyncOrchestrator};
use crate::tokens::{OAuthRefreshClient, TokenManager};

/// Persistent state and token access, without any sync machinery
pub struct StateServices {
    /// `SQLite` stores
    pub database: Arc<Database>,
    /// Token lifecycle manager
    pub tokens: Arc<TokenManager>,
    /// Transport shared by every outbound call
    pub transport: Arc<dyn VendorTransport>,
}

impl StateServices {
    /// Open the database and load tokens
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or tokens cannot be read
    pub async fn open(config: &SyncConfig) -> Result<Self> {
        initialize_shared_client(config.http);
        let database = Arc::new(Database::new(&config.database_url).await?);
        let transport: Arc<dyn VendorTransport> = Arc::new(HttpTransport::shared());
        let refresher = Arc::new(OAuthRefreshClient::from_config(
            Arc::clone(&transport),
            config,
        ));
        let tokens = Arc::new(
            TokenManager::load(
                Arc::clone(&database) as Arc<dyn TokenStore>,
                refresher,
                config.token_safety_margin,
                config.retry,
            )
            .await
            .context("Failed to load tokens")?,
        );

        Ok(Self {
            database,
            tokens,
            transport,
        })
    }
}

/// Everything needed to run sync cycles
pub struct SyncServices {
    /// Stores and token manager
    pub state: StateServices,
    /// Cycle driver
    pub orchestrator: SyncOrchestrator,
}

impl SyncServices {
    /// Build the full service graph
    ///
    /// # Errors
    ///
    /// Returns an error if state cannot be opened or the calendar URL is invalid
    pub async fn build(config: &SyncConfig) -> Result<Self> {
        let state = StateServices::open(config).await?;

        let limiter = Arc::new(RateLimiter::new(config.rate_limit));
        let context = AdapterContext::new(
            Arc::clone(&state.tokens) as Arc<dyn TokenSource>,
            limiter,
            config.retry,
            Arc::clone(&state.transport),
        );

        let adapters: Vec<Arc<dyn DeviceAdapter>> = vec![
            Arc::new(
                WithingsAdapter::with_api_base(context.clone(), config.withings_api_base.clone())
                    .with_rescan_window(config.rescan_window),
            ),
            Arc::new(
                OmronAdapter::with_api_base(context.clone(), config.omron_api_base.clone())
                    .with_rescan_window(config.rescan_window),
            ),
        ];
        let calendar = Arc::new(GoogleCalendarClient::with_api_base(
            context,
            &config.calendar_api_base,
            &config.calendar_id,
        )?);
        let ledger = Arc::new(DeduplicationLedger::new(
            Arc::clone(&state.database) as Arc<dyn SyncRecordStore>,
        ));

        let orchestrator = SyncOrchestrator::new(
            adapters,
            ledger,
            calendar,
            Arc::clone(&state.database) as Arc<dyn CheckpointStore>,
            OrchestratorSettings {
                initial_lookback: config.initial_lookback,
                checkpoint_overlap: config.checkpoint_overlap,
            },
        );

        Ok(Self {
            state,
            orchestrator,
        })
    }
}
