//! Application state shared across all request handlers.

use kart_core::broadcast::BroadcastHub;
use kart_core::config::SharedConfig;
use kart_core::coordinator::RaceCoordinator;
use kart_core::framework::DatabaseProcessor;
use sqlx::PgPool;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Server, admin and relay configuration (can be reloaded via SIGHUP).
    pub config: SharedConfig,
    /// The league state machine.
    pub coordinator: RaceCoordinator,
    /// Viewer registry fed by the snapshot broadcast loop.
    pub hub: BroadcastHub<RaceCoordinator>,
}

impl AppState {
    pub fn new(db: PgPool, config: SharedConfig, coordinator: RaceCoordinator) -> Self {
        Self {
            db,
            config,
            hub: BroadcastHub::new(coordinator.clone()),
            coordinator,
        }
    }

    /// Database processor over the shared pool.
    pub fn processor(&self) -> DatabaseProcessor {
        DatabaseProcessor {
            pool: self.db.clone(),
        }
    }
}
