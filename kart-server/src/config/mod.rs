//! Configuration module for kart-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables. Also handles admin secret hashing.

pub mod file;

use crate::config::file::{FileConfig, LeagueConfig as FileLeagueConfig};
use kart_core::config::{
    AdminConfig, LeagueConfig, PayoutRule, RelayConfig, ServerConfig, SharedConfig,
};
use rand::Rng;
use rust_decimal::Decimal;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("password hashing error: {0}")]
    HashError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Loaded configuration result containing all parts.
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub admin: AdminConfig,
    pub relay: RelayConfig,
    pub league: LeagueConfig,
    /// The file left `league.lobby_code` unset and a fresh code was drawn.
    pub lobby_code_generated: bool,
}

impl LoadedConfig {
    /// Split off the league rules, which the coordinator owns, and wrap the
    /// rest for sharing.
    pub fn into_shared(self) -> (SharedConfig, LeagueConfig) {
        let shared = SharedConfig {
            server: Arc::new(RwLock::new(self.server)),
            admin: Arc::new(RwLock::new(self.admin)),
            relay: Arc::new(RwLock::new(self.relay)),
        };
        (shared, self.league)
    }
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Validate the configuration
    /// 4. Hash the admin secret if it's plaintext (and rewrite the file)
    /// 5. Build the loaded configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let mut file_config: FileConfig = toml::from_str(&config_content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        validate(&file_config)?;

        let secret_hash = if file_config.is_admin_secret_hashed() {
            file_config.admin.secret.clone()
        } else {
            let hash = hash_secret(&file_config.admin.secret)?;
            file_config.admin.secret = hash.clone();
            self.rewrite_config(&file_config)?;
            tracing::info!("Admin secret hashed and config file updated");
            hash
        };

        Ok(build_loaded_config(file_config, secret_hash))
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    fn rewrite_config(&self, config: &FileConfig) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(config)?;

        // Write to a temp file, then rename over the original.
        let temp_path = self.config_path.with_extension("toml.tmp");
        std::fs::write(&temp_path, toml_string)?;
        std::fs::rename(&temp_path, &self.config_path)?;

        Ok(())
    }
}

const READY_TIMEOUT_SECS: std::ops::RangeInclusive<u64> = 1..=3600;

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    let league = &config.league;
    if league.max_racers == 0 {
        return Err(ConfigError::ValidationError(
            "league.max_racers must be at least 1".to_string(),
        ));
    }
    if league.min_racers == 0 || league.min_racers > league.max_racers {
        return Err(ConfigError::ValidationError(format!(
            "league.min_racers must be between 1 and max_racers ({})",
            league.max_racers
        )));
    }
    if !READY_TIMEOUT_SECS.contains(&league.ready_timeout_secs) {
        return Err(ConfigError::ValidationError(format!(
            "league.ready_timeout_secs must be between {} and {}, got {}",
            READY_TIMEOUT_SECS.start(),
            READY_TIMEOUT_SECS.end(),
            league.ready_timeout_secs
        )));
    }
    if league.vibe_multiplier < Decimal::ONE {
        return Err(ConfigError::ValidationError(format!(
            "league.vibe_multiplier must be at least 1, got {}",
            league.vibe_multiplier
        )));
    }
    if let PayoutRule::Split { shares } = &league.payout {
        if shares.iter().any(Decimal::is_sign_negative) {
            return Err(ConfigError::ValidationError(
                "league.payout shares must not be negative".to_string(),
            ));
        }
    }
    if config.relay.secret.is_empty() {
        return Err(ConfigError::ValidationError(
            "relay.secret must not be empty".to_string(),
        ));
    }
    if config.server.subscriber_buffer == 0 || config.server.broadcast_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "server.subscriber_buffer and server.broadcast_interval_ms must be positive"
                .to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn hash_secret(plaintext: &str) -> Result<String, ConfigError> {
    use argon2::{
        Argon2, PasswordHasher,
        password_hash::{SaltString, rand_core::OsRng},
    };

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ConfigError::HashError(e.to_string()))
}

/// A fresh `NNNN-XXXX` lobby code.
fn generate_lobby_code() -> String {
    const LETTERS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
    let mut rng = rand::rng();
    let digits: u16 = rng.random_range(1000..10000);
    let letters: String = (0..4)
        .map(|_| char::from(LETTERS[rng.random_range(0..LETTERS.len())]))
        .collect();
    format!("{digits}-{letters}")
}

fn convert_league(league: FileLeagueConfig) -> LeagueConfig {
    LeagueConfig {
        max_racers: league.max_racers,
        min_racers: league.min_racers,
        ready_timeout: Duration::from_secs(league.ready_timeout_secs),
        vibe_multiplier: league.vibe_multiplier,
        lobby_code: league.lobby_code.unwrap_or_else(generate_lobby_code),
        timeout_policy: league.timeout_policy,
        payout_rule: league.payout,
    }
}

fn build_loaded_config(file_config: FileConfig, secret_hash: String) -> LoadedConfig {
    let lobby_code_generated = file_config.league.lobby_code.is_none();
    LoadedConfig {
        server: ServerConfig {
            listen: file_config.server.listen,
            broadcast_interval: Duration::from_millis(file_config.server.broadcast_interval_ms),
            subscriber_buffer: file_config.server.subscriber_buffer,
        },
        admin: AdminConfig::new(secret_hash),
        relay: RelayConfig::new(file_config.relay.secret.into_bytes()),
        league: convert_league(file_config.league),
        lobby_code_generated,
    }
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}
