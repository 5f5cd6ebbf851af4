//! League rules.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What happens when the ready-check deadline passes with racers missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// Drop whoever did not confirm and start with the rest, as long as at
    /// least `min_racers` confirmed. Otherwise the whole grid goes back to
    /// the queue.
    #[default]
    DropUnconfirmed,
    /// Put the whole grid back in the queue.
    Cancel,
}

/// How the pot is paid out at the end of a race.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayoutRule {
    /// Each racer takes home exactly their own session total.
    #[default]
    OwnPot,
    /// The combined pot is split by rank. `shares[0]` is rank 1's weight;
    /// ranks past the end of the list get nothing.
    Split { shares: Vec<Decimal> },
}

/// Rules applied by the race coordinator. Reloadable at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeagueConfig {
    pub max_racers: usize,
    /// Fewest confirmed racers a ready-check may start with after dropping
    /// the unconfirmed.
    pub min_racers: usize,
    pub ready_timeout: Duration,
    /// Applied to donations while a racer's vibe bonus is on.
    pub vibe_multiplier: Decimal,
    /// Revealed to racers in the race start announcement.
    pub lobby_code: String,
    pub timeout_policy: TimeoutPolicy,
    pub payout_rule: PayoutRule,
}

impl Default for LeagueConfig {
    fn default() -> Self {
        Self {
            max_racers: 4,
            min_racers: 2,
            ready_timeout: Duration::from_secs(5),
            vibe_multiplier: Decimal::new(15, 1),
            lobby_code: "8841-COZY".to_owned(),
            timeout_policy: TimeoutPolicy::default(),
            payout_rule: PayoutRule::default(),
        }
    }
}
