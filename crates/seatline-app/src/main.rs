//! Seatline application binary - composition root.
//!
//! Ties together all Seatline crates into a single executable:
//! 1. Parse the CLI and load configuration from TOML
//! 2. Initialize tracing
//! 3. Open the configured store backend and seed tables
//! 4. Start the vacate scheduler loop and the optional session sweeper
//! 5. Serve the axum REST API until Ctrl-C

mod cli;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use seatline_api::auth::load_or_generate_token;
use seatline_api::state::AppState;
use seatline_booking::{InMemorySessionStore, Stores, VacateScheduler};
use seatline_core::config::{SeatlineConfig, StorageBackend};
use seatline_core::error::Result;
use seatline_core::settings::{LayeredSettings, SettingLookup, StaticSettings};
use seatline_storage::{
    seed_if_empty, Database, SqliteHistoryStore, SqliteQueueStore, SqliteSettings,
    SqliteTableStore, SqliteUserDirectory,
};

use crate::cli::CliArgs;

/// `RUST_LOG` wins over the resolved level.
fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();
}

/// Open the configured backend. Stored settings are layered over the
/// `[booking]` defaults from the config file.
fn build_stores(config: &SeatlineConfig, data_dir: &Path) -> Result<Stores> {
    let defaults = StaticSettings::from(&config.booking);

    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::info!(
                tables = config.storage.seed_tables.len(),
                "Using in-memory stores"
            );
            let settings: Arc<dyn SettingLookup> = Arc::new(defaults);
            Stores::in_memory(config.storage.seed_tables.clone(), settings)
        }
        StorageBackend::Sqlite => {
            let db_path = data_dir.join(&config.storage.database_file);
            let db = Arc::new(Database::new(&db_path)?);

            let tables = SqliteTableStore::new(Arc::clone(&db));
            let seeded = seed_if_empty(&tables, &config.storage.seed_tables)?;
            if seeded > 0 {
                tracing::info!(count = seeded, "Seeded restaurant tables");
            }

            let stored: Arc<dyn SettingLookup> = Arc::new(SqliteSettings::new(Arc::clone(&db)));
            Ok(Stores {
                tables: Arc::new(tables),
                queue: Arc::new(SqliteQueueStore::new(Arc::clone(&db))),
                history: Arc::new(SqliteHistoryStore::new(Arc::clone(&db))),
                users: Arc::new(SqliteUserDirectory::new(db)),
                settings: Arc::new(LayeredSettings::new(stored, defaults)),
            })
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let config = SeatlineConfig::load_or_default(&config_file);

    // Tracing.
    init_tracing(&args.resolve_log_level(&config.general.log_level));
    tracing::info!("Starting Seatline v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    // Storage.
    let data_dir = args.resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }
    let stores = build_stores(&config, &data_dir)?;

    // Booking services.
    let scheduler = Arc::new(VacateScheduler::new(Arc::clone(&stores.settings)));
    let sessions = Arc::new(InMemorySessionStore::new(Duration::from_secs(
        config.session.ttl_secs,
    )));
    let api_token = load_or_generate_token(&data_dir.join(&config.api.token_file));
    let port = args.resolve_port(config.general.port);
    let sweep_secs = config.session.sweep_interval_secs;

    let state = AppState::new(config, stores, sessions, Arc::clone(&scheduler), api_token);

    // === Background tasks ===

    let runner = Arc::clone(&scheduler);
    let scheduler_task = tokio::spawn(async move { runner.run().await });

    let sweeper = if sweep_secs > 0 {
        tracing::info!(interval_secs = sweep_secs, "Session sweeper enabled");
        Some(Arc::clone(&state.engine).spawn_sweeper(Duration::from_secs(sweep_secs)))
    } else {
        None
    };

    // === API server ===

    let served = seatline_api::start_server(state, port, shutdown_signal()).await;

    scheduler.shutdown();
    if let Err(e) = scheduler_task.await {
        tracing::warn!(error = %e, "Scheduler task ended abnormally");
    }
    if let Some(handle) = sweeper {
        handle.abort();
    }

    if let Err(e) = served {
        tracing::error!(error = %e, "API server failed");
        return Err(e.into());
    }
    tracing::info!("Seatline stopped");
    Ok(())
}
