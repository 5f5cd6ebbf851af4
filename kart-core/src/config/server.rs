//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;

/// Network and broadcast settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The address and port to listen on.
    pub listen: SocketAddr,
    /// Cadence of the snapshot broadcast.
    pub broadcast_interval: Duration,
    /// Snapshots buffered per viewer before it is considered too slow.
    pub subscriber_buffer: usize,
}
