//! TOML file configuration structures.
//!
//! These structs directly map to the `kart-config.toml` file format.

use kart_core::config::{PayoutRule, TimeoutPolicy};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub admin: AdminConfig,
    pub relay: RelayConfig,
    #[serde(default)]
    pub league: LeagueConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
    /// How often viewers get a fresh snapshot.
    #[serde(default = "default_broadcast_interval_ms")]
    pub broadcast_interval_ms: u64,
    /// Snapshots buffered per viewer before it is dropped as too slow.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
            broadcast_interval_ms: default_broadcast_interval_ms(),
            subscriber_buffer: default_subscriber_buffer(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

fn default_broadcast_interval_ms() -> u64 {
    500
}

fn default_subscriber_buffer() -> usize {
    8
}

/// Admin configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// The admin secret. If this is plaintext (doesn't start with `$argon2`),
    /// it will be hashed and the config file will be rewritten.
    pub secret: String,
}

/// Donation relay section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Shared HMAC secret the relay signs requests with.
    pub secret: String,
}

/// League rules section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeagueConfig {
    #[serde(default = "default_max_racers")]
    pub max_racers: usize,
    #[serde(default = "default_min_racers")]
    pub min_racers: usize,
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
    #[serde(default = "default_vibe_multiplier")]
    pub vibe_multiplier: Decimal,
    /// Generated at load time when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lobby_code: Option<String>,
    #[serde(default)]
    pub timeout_policy: TimeoutPolicy,
    #[serde(default)]
    pub payout: PayoutRule,
}

impl Default for LeagueConfig {
    fn default() -> Self {
        Self {
            max_racers: default_max_racers(),
            min_racers: default_min_racers(),
            ready_timeout_secs: default_ready_timeout_secs(),
            vibe_multiplier: default_vibe_multiplier(),
            lobby_code: None,
            timeout_policy: TimeoutPolicy::default(),
            payout: PayoutRule::default(),
        }
    }
}

fn default_max_racers() -> usize {
    4
}

fn default_min_racers() -> usize {
    2
}

fn default_ready_timeout_secs() -> u64 {
    5
}

fn default_vibe_multiplier() -> Decimal {
    Decimal::new(15, 1)
}

impl FileConfig {
    /// Check if the admin secret is already hashed (argon2 format).
    pub fn is_admin_secret_hashed(&self) -> bool {
        self.admin.secret.starts_with("$argon2")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let toml_str = r#"
[admin]
secret = "pit-lane"

[relay]
secret = "relay-secret"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 8080);
        assert_eq!(config.server.broadcast_interval_ms, 500);
        assert_eq!(config.league.max_racers, 4);
        assert_eq!(config.league.min_racers, 2);
        assert_eq!(config.league.vibe_multiplier, Decimal::new(15, 1));
        assert_eq!(config.league.timeout_policy, TimeoutPolicy::DropUnconfirmed);
        assert_eq!(config.league.payout, PayoutRule::OwnPot);
        assert!(config.league.lobby_code.is_none());
        assert!(!config.is_admin_secret_hashed());
    }

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"
broadcast_interval_ms = 250
subscriber_buffer = 16

[admin]
secret = "$argon2id$v=19$m=19456,t=2,p=1$abc123"

[relay]
secret = "relay-secret"

[league]
max_racers = 8
min_racers = 3
ready_timeout_secs = 10
vibe_multiplier = "2.0"
lobby_code = "8841-COZY"
timeout_policy = "cancel"

[league.payout]
kind = "split"
shares = ["50", "30", "20"]
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.server.subscriber_buffer, 16);
        assert_eq!(config.league.max_racers, 8);
        assert_eq!(config.league.timeout_policy, TimeoutPolicy::Cancel);
        assert_eq!(config.league.lobby_code.as_deref(), Some("8841-COZY"));
        assert_eq!(
            config.league.payout,
            PayoutRule::Split {
                shares: vec![Decimal::from(50), Decimal::from(30), Decimal::from(20)]
            }
        );
        assert!(config.is_admin_secret_hashed());
    }

    #[test]
    fn test_round_trip_through_rewrite() {
        let config = FileConfig {
            server: ServerConfig::default(),
            admin: AdminConfig {
                secret: "$argon2id$v=19$m=19456,t=2,p=1$abc123".to_string(),
            },
            relay: RelayConfig {
                secret: "relay-secret".to_string(),
            },
            league: LeagueConfig::default(),
        };
        let written = toml::to_string_pretty(&config).unwrap();
        let reread: FileConfig = toml::from_str(&written).unwrap();
        assert_eq!(reread.admin.secret, config.admin.secret);
        assert_eq!(reread.league.vibe_multiplier, config.league.vibe_multiplier);
        assert_eq!(reread.league.payout, PayoutRule::OwnPot);
    }
}
