use compact_str::CompactString;
use kart_sdk::RacePhase;
use thiserror::Error;

/// Why the coordinator refused an operation. State is unchanged whenever
/// one of these is returned, except for [`RaceError::InsufficientRacers`]
/// which reports a staging attempt that was already rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RaceError {
    #[error("racer {racer_id} is already queued")]
    AlreadyQueued { racer_id: CompactString },

    #[error("the grid is full ({max_racers} racers)")]
    RosterFull { max_racers: usize },

    #[error("cannot {operation} while {phase}")]
    WrongPhase {
        operation: &'static str,
        phase: RacePhase,
    },

    #[error("racer {racer_id} is not on the grid")]
    UnknownRacer { racer_id: CompactString },

    #[error("only {confirmed} racers confirmed, {required} needed to start")]
    InsufficientRacers { confirmed: usize, required: usize },

    #[error("ready timeout of {ready_timeout_secs}s cannot be scheduled")]
    ReadyTimeoutOutOfRange { ready_timeout_secs: u64 },
}

impl RaceError {
    /// Machine-readable tag for API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            RaceError::AlreadyQueued { .. } => "already_queued",
            RaceError::RosterFull { .. } => "roster_full",
            RaceError::WrongPhase { .. } => "wrong_phase",
            RaceError::UnknownRacer { .. } => "unknown_racer",
            RaceError::InsufficientRacers { .. } => "insufficient_racers",
            RaceError::ReadyTimeoutOutOfRange { .. } => "ready_timeout_out_of_range",
        }
    }
}
