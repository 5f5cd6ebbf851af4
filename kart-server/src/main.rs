//! Cozy Kart League Server
//!
//! Runs the racing league: grid queue, ready-check, live donation pots and
//! payouts, with a live snapshot stream for overlays.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, get_database_url};
use kanau::processor::Processor;
use kart_core::coordinator::RaceCoordinator;
use kart_core::entities::queue::{GetActiveGrid, RequeueInterrupted};
use kart_core::entities::race_history::PgLedger;
use kart_core::framework::DatabaseProcessor;
use kart_core::processors::{EventAnnouncer, QueueSync};
use server::{build_router, run_server};
use shutdown::{shutdown_signal, spawn_config_reload_handler};
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Cozy Kart - donation-driven racing league server
#[derive(Parser, Debug)]
#[command(name = "kart-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./kart-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting kart-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    let listen_addr = loaded_config.server.listen;
    let broadcast_interval = loaded_config.server.broadcast_interval;
    tracing::info!("Configuration loaded from {:?}", args.config);

    // League rules go to the coordinator, the rest is shared with handlers
    let (shared_config, league) = loaded_config.into_shared();
    tracing::info!(lobby_code = %league.lobby_code, "League configured");

    // Get database URL from environment
    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    // Run migrations if requested
    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    let processor = DatabaseProcessor {
        pool: db_pool.clone(),
    };
    let max_racers = league.max_racers;
    let coordinator = RaceCoordinator::new(league, Arc::new(PgLedger::new(db_pool.clone())));

    // Start event consumers before anything is emitted
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let announcer_handle = tokio::spawn(
        EventAnnouncer::new().run(shutdown_rx.clone(), coordinator.subscribe_events().await),
    );
    let queue_sync_handle = tokio::spawn(
        QueueSync::new(processor.clone())
            .run(shutdown_rx.clone(), coordinator.subscribe_events().await),
    );

    restore_grid(&processor, &coordinator, max_racers).await?;

    // Create application state
    let state = AppState::new(db_pool.clone(), shared_config, coordinator.clone());

    let hub_handle = tokio::spawn(state.hub.clone().run(broadcast_interval, shutdown_rx.clone()));

    // Spawn config reload handler (listens for SIGHUP)
    let reload_handle =
        spawn_config_reload_handler(state.clone(), config_loader, shutdown_rx.clone());

    // Build the router
    let router = build_router(state);

    // Run the server
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr, shutdown_signal()).await;

    // Stop background tasks; event consumers drain what is buffered
    let _ = shutdown_tx.send(true);
    coordinator.close_events().await;
    for (name, handle) in [
        ("broadcast hub", hub_handle),
        ("event announcer", announcer_handle),
        ("queue sync", queue_sync_handle),
        ("config reload", reload_handle),
    ] {
        if let Err(e) = handle.await {
            tracing::error!(task = name, error = %e, "Background task panicked");
        }
    }

    // Close database connections gracefully
    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Rebuild the grid from queue entries left by a previous run.
///
/// Entries stranded in `racing` go back to `queued` first; the race they
/// belonged to did not survive the restart.
async fn restore_grid(
    processor: &DatabaseProcessor,
    coordinator: &RaceCoordinator,
    max_racers: usize,
) -> anyhow::Result<()> {
    let requeued = processor.process(RequeueInterrupted).await?;
    if requeued > 0 {
        tracing::warn!(requeued, "Interrupted race entries returned to the queue");
    }

    let limit = i64::try_from(max_racers).unwrap_or(i64::MAX);
    let grid = processor.process(GetActiveGrid { limit }).await?;
    let mut restored = 0usize;
    for entry in grid {
        match coordinator
            .enqueue(entry.racer_id.as_str().into(), entry.display_name)
            .await
        {
            Ok(_) => restored += 1,
            Err(e) => {
                tracing::warn!(racer_id = %entry.racer_id, error = %e, "Skipped stored queue entry");
            }
        }
    }
    if restored > 0 {
        tracing::info!(restored, "Grid restored from database");
    }
    Ok(())
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
