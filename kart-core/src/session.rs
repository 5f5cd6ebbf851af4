//! Per-racer pot accounting for the race in progress.

use compact_str::CompactString;
use kart_sdk::Money;
use rust_decimal::Decimal;

/// A racer's live pot and bonus state.
///
/// Created when the roster is frozen at staging. The coordinator only lets
/// donations through while the race is running, so once the race ends the
/// total is final.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RacerSession {
    racer_id: CompactString,
    display_name: String,
    grid_position: usize,
    session_total: Money,
    vibe_bonus_active: bool,
    donation_count: u32,
}

impl RacerSession {
    pub fn new(racer_id: CompactString, display_name: String, grid_position: usize) -> Self {
        Self {
            racer_id,
            display_name,
            grid_position,
            session_total: Money::ZERO,
            vibe_bonus_active: false,
            donation_count: 0,
        }
    }

    pub fn racer_id(&self) -> &CompactString {
        &self.racer_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Zero-based slot in the frozen roster. Earlier slots win ties.
    pub fn grid_position(&self) -> usize {
        self.grid_position
    }

    pub fn session_total(&self) -> Money {
        self.session_total
    }

    pub fn vibe_bonus_active(&self) -> bool {
        self.vibe_bonus_active
    }

    pub fn donation_count(&self) -> u32 {
        self.donation_count
    }

    /// Credit a donation, scaled by `vibe_multiplier` if the bonus is on
    /// right now. Returns the amount actually credited.
    pub fn apply_donation(&mut self, amount: Money, vibe_multiplier: Decimal) -> Money {
        let credited = if self.vibe_bonus_active {
            amount.scale(vibe_multiplier)
        } else {
            amount
        };
        self.session_total += credited;
        self.donation_count = self.donation_count.saturating_add(1);
        credited
    }

    /// Switch the bonus. Already credited donations keep their value.
    /// Returns whether the flag changed.
    pub fn set_vibe_bonus(&mut self, active: bool) -> bool {
        let changed = self.vibe_bonus_active != active;
        self.vibe_bonus_active = active;
        changed
    }

    pub(crate) fn set_grid_position(&mut self, grid_position: usize) {
        self.grid_position = grid_position;
    }
}
