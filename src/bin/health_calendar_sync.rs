// ABOUTME: Command-line entry point for the health calendar sync daemon
// ABOUTME: Runs the periodic sync loop, a single cycle, token import, or a status report
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Health Calendar Sync Binary
//!
//! `run` syncs every `HEALTH_SYNC_INTERVAL_SECS` until Ctrl-C, `once` runs a
//! single cycle and prints its report, `import-token` stores a token obtained
//! out of band, and `status` prints checkpoints and token expiries.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use health_calendar_sync::app::{StateServices, SyncServices};
use health_calendar_sync::config::SyncConfig;
use health_calendar_sync::database::{CheckpointStore, SyncRecordStore};
use health_calendar_sync::logging;
use health_sync_core::{Provider, Token};
use serde_json::json;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "health-calendar-sync")]
#[command(version, about = "Mirror Withings and Omron measurements into Google Calendar")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sync periodically until interrupted
    Run,
    /// Run one sync cycle and print its report as JSON
    Once,
    /// Store an OAuth token obtained outside this tool
    ImportToken {
        /// Provider the token belongs to (withings, omron, calendar)
        #[arg(long)]
        provider: Provider,
        /// Access token
        #[arg(long)]
        access_token: String,
        /// Refresh token
        #[arg(long)]
        refresh_token: String,
        /// Seconds until the access token expires
        #[arg(long, conflicts_with = "expires_at")]
        expires_in: Option<i64>,
        /// Absolute expiry (RFC 3339)
        #[arg(long)]
        expires_at: Option<DateTime<Utc>>,
    },
    /// Print checkpoints, record count and token expiries
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_from_env()?;

    let config = SyncConfig::from_env().context("Failed to load configuration")?;

    match cli.command {
        Command::Run => run(&config).await,
        Command::Once => once(&config).await,
        Command::ImportToken {
            provider,
            access_token,
            refresh_token,
            expires_in,
            expires_at,
        } => {
            let expires_at = match (expires_at, expires_in) {
                (Some(at), _) => at,
                (None, Some(secs)) => Utc::now() + Duration::seconds(secs),
                (None, None) => return Err(anyhow!("pass --expires-in or --expires-at")),
            };
            import_token(
                &config,
                Token {
                    provider,
                    access_token,
                    refresh_token,
                    expires_at,
                },
            )
            .await
        }
        Command::Status => status(&config).await,
    }
}

/// Flip the returned receiver to `true` on Ctrl-C
fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown requested, finishing in-flight work");
                let _ = tx.send(true);
            }
            Err(e) => error!(error = %e, "failed to listen for Ctrl-C"),
        }
    });
    rx
}

async fn run(config: &SyncConfig) -> Result<()> {
    config.validate()?;
    config.log_summary();

    let services = SyncServices::build(config).await?;
    let shutdown = shutdown_on_ctrl_c();
    services
        .orchestrator
        .run_forever(config.sync_interval, shutdown)
        .await;
    Ok(())
}

async fn once(config: &SyncConfig) -> Result<()> {
    config.validate()?;

    let services = SyncServices::build(config).await?;
    let shutdown = shutdown_on_ctrl_c();
    let report = services.orchestrator.run_cycle(&shutdown).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.failed() > 0 || report.sources.iter().any(|s| s.error.is_some()) {
        return Err(anyhow!("sync cycle finished with failures"));
    }
    Ok(())
}

async fn import_token(config: &SyncConfig, token: Token) -> Result<()> {
    let state = StateServices::open(config).await?;
    let provider = token.provider;
    let expires_at = token.expires_at;
    state
        .tokens
        .install(token)
        .await
        .with_context(|| format!("Failed to store {provider} token"))?;
    println!("stored {provider} token (expires {expires_at})");
    Ok(())
}

async fn status(config: &SyncConfig) -> Result<()> {
    let state = StateServices::open(config).await?;

    let checkpoints = state.database.list_checkpoints().await?;
    let records = state.database.count_records().await?;

    let mut tokens = Vec::new();
    for provider in Provider::ALL {
        let cached = state.tokens.cached(provider).await;
        tokens.push(json!({
            "provider": provider.as_str(),
            "present": cached.is_some(),
            "expires_at": cached.map(|t| t.expires_at),
        }));
    }

    let report = json!({
        "database_url": config.database_url,
        "sync_records": records,
        "checkpoints": checkpoints
            .iter()
            .map(|c| json!({ "source": c.source.as_str(), "fetched_through": c.fetched_through }))
            .collect::<Vec<_>>(),
        "tokens": tokens,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
