//! Configuration types for the league.
//!
//! These types represent the validated runtime configuration. Loading and
//! parsing the TOML file is handled by the server crate.

mod admin;
mod league;
mod relay;
mod server;

pub use admin::AdminConfig;
pub use league::{LeagueConfig, PayoutRule, TimeoutPolicy};
pub use relay::RelayConfig;
pub use server::ServerConfig;

use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared configuration state with separate locks for each section.
///
/// League rules are not here: they belong to the race coordinator, which
/// swaps them under its own lock.
#[derive(Clone)]
pub struct SharedConfig {
    /// Server configuration (listen address, broadcast cadence).
    pub server: Arc<RwLock<ServerConfig>>,
    /// Admin configuration (authentication).
    pub admin: Arc<RwLock<AdminConfig>>,
    /// Donation relay configuration (request signing).
    pub relay: Arc<RwLock<RelayConfig>>,
}
