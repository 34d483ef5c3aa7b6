pub mod cli;
pub mod context;
pub mod core;
pub mod feeds;
pub mod store;

use crate::cli::correlate::CorrelateRequest;
use crate::cli::series::SeriesView;
use crate::context::DashboardContext;
use crate::core::config::{AppConfig, Collections};
use crate::core::series::NormalizeOptions;
use crate::core::store::DocumentStore;
use crate::feeds::FeedKind;
use anyhow::Result;
use chrono::{NaiveDate, Utc};
use std::path::PathBuf;
use tracing::{debug, info, warn};

pub enum AppCommand {
    Ingest {
        kind: FeedKind,
        dir: PathBuf,
        remove_processed: bool,
    },
    Series {
        options: NormalizeOptions,
        view: SeriesView,
    },
    Rates,
    Correlate {
        options: NormalizeOptions,
        request: CorrelateRequest,
    },
}

/// Runs a command against the store named by the environment.
pub async fn run_command(command: AppCommand) -> Result<()> {
    let config = AppConfig::from_env()?;
    if let Some(notice) = store::ephemeral_store_notice(&config) {
        warn!("{notice}");
    }
    run_command_with(command, &config, Utc::now().date_naive()).await
}

/// Runs a command with an explicit configuration and reference day.
pub async fn run_command_with(
    command: AppCommand,
    config: &AppConfig,
    today: NaiveDate,
) -> Result<()> {
    info!("feedboard starting...");
    debug!("Loaded config: {config:#?}");

    let store = store::open_store(config)?;
    run_with_store(command, store.as_ref(), &config.collections, today).await
}

/// Runs a command against an already open store.
pub async fn run_with_store(
    command: AppCommand,
    store: &dyn DocumentStore,
    collections: &Collections,
    today: NaiveDate,
) -> Result<()> {
    match command {
        AppCommand::Ingest {
            kind,
            dir,
            remove_processed,
        } => cli::ingest::run(store, collections, kind, &dir, remove_processed, today).await,
        AppCommand::Series { options, view } => {
            let context = DashboardContext::load(store, collections, today).await?;
            cli::series::run(&context, &options, view)
        }
        AppCommand::Rates => {
            let context = DashboardContext::load(store, collections, today).await?;
            cli::rates::run(&context)
        }
        AppCommand::Correlate { options, request } => {
            let context = DashboardContext::load(store, collections, today).await?;
            cli::correlate::run(&context, &options, request)
        }
    }
}
