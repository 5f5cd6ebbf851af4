//! Participant-facing request and response bodies.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// `POST /api/v1/racers/join`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    /// Stable platform identifier of the participant.
    pub racer_id: CompactString,
    /// In-game username shown on the grid.
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinResponse {
    pub racer_id: CompactString,
    /// Zero-based slot on the grid.
    pub grid_position: usize,
    /// Racers queued after this join, including this one.
    pub queued: usize,
    pub max_racers: usize,
}

/// Result of a ready confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReadyResponse {
    /// Confirmation recorded; still waiting on others.
    Waiting { confirmed: usize, total: usize },
    /// This confirmation completed the ready-check.
    RaceStarted { total: usize },
    /// The racer had already confirmed; nothing changed.
    AlreadyConfirmed { confirmed: usize, total: usize },
}
