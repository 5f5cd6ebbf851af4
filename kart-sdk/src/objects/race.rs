//! Race state as seen by viewers.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::Money;

/// Lifecycle phase of the league coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RacePhase {
    /// Nobody queued.
    Empty,
    /// Racers are joining the grid.
    Queuing,
    /// Roster frozen, ready-check running.
    Staging,
    /// Race in progress, donations accepted.
    Racing,
    /// Race over, payouts final.
    Payout,
}

impl std::fmt::Display for RacePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RacePhase::Empty => write!(f, "EMPTY"),
            RacePhase::Queuing => write!(f, "QUEUING"),
            RacePhase::Staging => write!(f, "STAGING"),
            RacePhase::Racing => write!(f, "RACING"),
            RacePhase::Payout => write!(f, "PAYOUT"),
        }
    }
}

/// One racer's line in a [`StateSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RacerStanding {
    pub racer_id: CompactString,
    pub display_name: String,
    /// Zero-based slot on the grid (queue order).
    pub grid_position: usize,
    /// Confirmed during the ready-check. Stays `true` once racing.
    pub ready: bool,
    pub session_total: Money,
    pub vibe_bonus_active: bool,
    /// Final rank, only present in the `PAYOUT` phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    /// Final payout, only present in the `PAYOUT` phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout: Option<Money>,
}

/// Immutable point-in-time summary of the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub phase: RacePhase,
    /// Present from staging until reset.
    pub race_id: Option<Uuid>,
    /// Grid order.
    pub roster: Vec<RacerStanding>,
    pub total_pot: Money,
    /// Milliseconds since the race started; zero before `RACING`.
    pub elapsed_ms: u64,
    /// Milliseconds left in the ready-check, only during `STAGING`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_deadline_ms: Option<u64>,
    pub max_racers: usize,
}

impl StateSnapshot {
    /// Snapshot of a coordinator with nobody queued.
    pub fn empty(max_racers: usize) -> Self {
        Self {
            phase: RacePhase::Empty,
            race_id: None,
            roster: Vec::new(),
            total_pot: Money::ZERO,
            elapsed_ms: 0,
            ready_deadline_ms: None,
            max_racers,
        }
    }

    pub fn standing(&self, racer_id: &str) -> Option<&RacerStanding> {
        self.roster.iter().find(|r| r.racer_id == racer_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_wire_format() {
        let json = serde_json::to_string(&RacePhase::Payout).unwrap();
        assert_eq!(json, "\"PAYOUT\"");
        let phase: RacePhase = serde_json::from_str("\"STAGING\"").unwrap();
        assert_eq!(phase, RacePhase::Staging);
    }

    #[test]
    fn test_empty_snapshot_omits_optional_fields() {
        let value = serde_json::to_value(StateSnapshot::empty(4)).unwrap();
        assert_eq!(value["phase"], "EMPTY");
        assert_eq!(value["max_racers"], 4);
        assert!(value.get("ready_deadline_ms").is_none());
    }
}
