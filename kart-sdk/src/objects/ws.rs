//! WebSocket message types for the live state stream.
//!
//! The `GET /ws` endpoint upgrades to a WebSocket connection and pushes
//! [`WsServerMessage`] JSON frames.
//!
//! # Protocol
//!
//! 1. The server sends a [`WsServerMessage::Snapshot`] immediately after
//!    the upgrade, so a fresh viewer never starts blank.
//! 2. Further snapshots follow at a fixed cadence (twice per second by
//!    default) whether or not anything changed.
//! 3. Client frames are ignored. They only keep the connection alive.
//! 4. A viewer that cannot keep up is dropped; the server sends a close
//!    frame with [`WsCloseCode::GOING_AWAY`] when it still can.

use serde::{Deserialize, Serialize};

use super::race::StateSnapshot;

/// Server-to-client WebSocket message.
///
/// ```json
/// {"type":"snapshot","snapshot":{"phase":"RACING", ... }}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsServerMessage {
    Snapshot { snapshot: StateSnapshot },
}

/// Well-known WebSocket close codes used by the state stream.
pub struct WsCloseCode;

impl WsCloseCode {
    /// Normal closure.
    pub const NORMAL: u16 = 1000;

    /// The server is shutting down or dropped this viewer.
    pub const GOING_AWAY: u16 = 1001;
}
