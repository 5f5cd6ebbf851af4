//! Lifecycle event definitions.
//!
//! Events are fire-and-forget notifications about transitions the
//! coordinator has already committed. Consumers use them for logging,
//! announcements and bookkeeping, never to drive state.

use compact_str::CompactString;
use kart_sdk::Money;
use kart_sdk::objects::admin::PayoutLine;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Why a staging attempt sent the grid back to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The deadline passed and the league cancels on timeout.
    ReadyTimeout,
    /// Too few racers confirmed to start after dropping the rest.
    InsufficientRacers { confirmed: usize, required: usize },
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::ReadyTimeout => write!(f, "ready check timed out"),
            CancelReason::InsufficientRacers {
                confirmed,
                required,
            } => write!(f, "only {confirmed} of {required} required racers confirmed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    RacerQueued {
        racer_id: CompactString,
        display_name: String,
        grid_position: usize,
        queued: usize,
        max_racers: usize,
    },
    StagingStarted {
        race_id: Uuid,
        roster: Vec<CompactString>,
        ready_timeout: Duration,
    },
    ReadyProgress {
        racer_id: CompactString,
        confirmed: usize,
        total: usize,
    },
    RacersDropped {
        race_id: Uuid,
        dropped: Vec<CompactString>,
        remaining: usize,
    },
    /// The ready timer fired and could not start the race.
    ReadyCheckFailed {
        race_id: Uuid,
        confirmed: usize,
        required: usize,
    },
    StagingCancelled {
        race_id: Uuid,
        reason: CancelReason,
        /// Racers put back in the queue, in grid order.
        returned: Vec<CompactString>,
    },
    RaceStart {
        race_id: Uuid,
        lobby_code: String,
        racers: Vec<CompactString>,
    },
    VibeBonusChanged {
        racer_id: CompactString,
        active: bool,
    },
    RaceFinished {
        race_id: Uuid,
        total_pot: Money,
        results: Vec<PayoutLine>,
        duration: Duration,
    },
    /// The race result could not be written to the ledger. The outcome
    /// still stands in memory.
    PersistenceWarning { race_id: Uuid, reason: String },
    Reset {
        race_id: Option<Uuid>,
        racers: usize,
    },
}

impl LifecycleEvent {
    /// Stable short name, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleEvent::RacerQueued { .. } => "racer_queued",
            LifecycleEvent::StagingStarted { .. } => "staging_started",
            LifecycleEvent::ReadyProgress { .. } => "ready_progress",
            LifecycleEvent::RacersDropped { .. } => "racers_dropped",
            LifecycleEvent::ReadyCheckFailed { .. } => "ready_check_failed",
            LifecycleEvent::StagingCancelled { .. } => "staging_cancelled",
            LifecycleEvent::RaceStart { .. } => "race_start",
            LifecycleEvent::VibeBonusChanged { .. } => "vibe_bonus_changed",
            LifecycleEvent::RaceFinished { .. } => "race_finished",
            LifecycleEvent::PersistenceWarning { .. } => "persistence_warning",
            LifecycleEvent::Reset { .. } => "reset",
        }
    }

    pub fn race_id(&self) -> Option<Uuid> {
        match self {
            LifecycleEvent::StagingStarted { race_id, .. }
            | LifecycleEvent::RacersDropped { race_id, .. }
            | LifecycleEvent::ReadyCheckFailed { race_id, .. }
            | LifecycleEvent::StagingCancelled { race_id, .. }
            | LifecycleEvent::RaceStart { race_id, .. }
            | LifecycleEvent::RaceFinished { race_id, .. }
            | LifecycleEvent::PersistenceWarning { race_id, .. } => Some(*race_id),
            LifecycleEvent::Reset { race_id, .. } => *race_id,
            LifecycleEvent::RacerQueued { .. }
            | LifecycleEvent::ReadyProgress { .. }
            | LifecycleEvent::VibeBonusChanged { .. } => None,
        }
    }
}

fn join_ids(ids: &[CompactString]) -> String {
    ids.iter()
        .map(CompactString::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::RacerQueued {
                racer_id,
                display_name,
                queued,
                max_racers,
                ..
            } => write!(
                f,
                "{display_name} ({racer_id}) joined the grid, {queued}/{max_racers}"
            ),
            LifecycleEvent::StagingStarted {
                roster,
                ready_timeout,
                ..
            } => write!(
                f,
                "Ready check for {} with {}s to confirm",
                join_ids(roster),
                ready_timeout.as_secs_f64()
            ),
            LifecycleEvent::ReadyProgress {
                racer_id,
                confirmed,
                total,
            } => write!(f, "{racer_id} is ready, {confirmed}/{total}"),
            LifecycleEvent::RacersDropped {
                dropped, remaining, ..
            } => write!(
                f,
                "Dropped {} for missing the ready check, {remaining} racing",
                join_ids(dropped)
            ),
            LifecycleEvent::ReadyCheckFailed {
                confirmed,
                required,
                ..
            } => write!(
                f,
                "Ready check failed, {confirmed} confirmed but {required} needed"
            ),
            LifecycleEvent::StagingCancelled {
                reason, returned, ..
            } => write!(
                f,
                "Staging cancelled ({reason}), {} back in queue",
                returned.len()
            ),
            LifecycleEvent::RaceStart {
                lobby_code, racers, ..
            } => write!(f, "RACE_START: lobby {lobby_code}, racers {}", join_ids(racers)),
            LifecycleEvent::VibeBonusChanged { racer_id, active } => {
                let state = if *active { "on" } else { "off" };
                write!(f, "Vibe bonus {state} for {racer_id}")
            }
            LifecycleEvent::RaceFinished {
                total_pot, results, ..
            } => match results.first() {
                Some(winner) => write!(
                    f,
                    "Race finished, {} wins, pot {total_pot}",
                    winner.display_name
                ),
                None => write!(f, "Race finished with an empty grid"),
            },
            LifecycleEvent::PersistenceWarning { race_id, reason } => {
                write!(f, "Could not record race {race_id}: {reason}")
            }
            LifecycleEvent::Reset { racers, .. } => {
                write!(f, "Board reset, cleared {racers} racers")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_race_start_announces_lobby_code() {
        let event = LifecycleEvent::RaceStart {
            race_id: Uuid::nil(),
            lobby_code: "8841-COZY".to_owned(),
            racers: vec!["r1".into(), "r2".into()],
        };
        let line = event.to_string();
        assert!(line.starts_with("RACE_START: lobby 8841-COZY"));
        assert!(line.contains("r1, r2"));
        assert_eq!(event.kind(), "race_start");
        assert_eq!(event.race_id(), Some(Uuid::nil()));
    }

    #[test]
    fn test_cancel_reason_text() {
        let reason = CancelReason::InsufficientRacers {
            confirmed: 1,
            required: 2,
        };
        assert_eq!(reason.to_string(), "only 1 of 2 required racers confirmed");
    }

    #[test]
    fn test_race_finished_names_winner() {
        let event = LifecycleEvent::RaceFinished {
            race_id: Uuid::nil(),
            total_pot: Money::from_cents(1550),
            results: vec![PayoutLine {
                racer_id: "r1".into(),
                display_name: "SpeedyBoi".to_owned(),
                rank: 1,
                session_total: Money::from_cents(1250),
                payout: Money::from_cents(1250),
            }],
            duration: Duration::from_secs(60),
        };
        assert_eq!(event.to_string(), "Race finished, SpeedyBoi wins, pot $15.50");
    }
}
