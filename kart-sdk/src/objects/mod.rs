pub mod admin;
pub mod money;
pub mod race;
pub mod racer;
pub mod relay;
pub mod ws;

pub use money::Money;
pub use race::{RacePhase, RacerStanding, StateSnapshot};

use serde::{Deserialize, Serialize};

/// JSON body returned with every non-2xx API response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// Stable machine-readable error kind, e.g. `already_queued`.
    pub error: String,
    /// Human-readable description.
    pub message: String,
}
