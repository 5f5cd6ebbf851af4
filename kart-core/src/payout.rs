//! Payout engine.
//!
//! Pure functions over the sessions of a finished race: rank them, total the
//! pot, and decide what each racer takes home under the configured
//! [`PayoutRule`].

use itertools::Itertools;
use kart_sdk::Money;
use kart_sdk::objects::admin::{PayoutLine, RaceResultsResponse};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::time::Duration;
use uuid::Uuid;

use crate::config::PayoutRule;
use crate::session::RacerSession;

/// The settled result of one race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceOutcome {
    pub race_id: Uuid,
    pub finished_at: time::OffsetDateTime,
    pub duration: Duration,
    pub total_pot: Money,
    /// Ordered by rank.
    pub results: Vec<PayoutLine>,
}

impl RaceOutcome {
    /// Rank 1, if anyone raced.
    pub fn winner(&self) -> Option<&PayoutLine> {
        self.results.first()
    }

    pub fn line(&self, racer_id: &str) -> Option<&PayoutLine> {
        self.results.iter().find(|line| line.racer_id == racer_id)
    }

    pub fn total_paid(&self) -> Money {
        self.results.iter().map(|line| line.payout).sum()
    }

    pub fn to_response(&self) -> RaceResultsResponse {
        RaceResultsResponse {
            race_id: self.race_id,
            total_pot: self.total_pot,
            duration_ms: duration_ms(self.duration),
            results: self.results.clone(),
        }
    }
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Order sessions by total, highest first. Equal totals keep grid order.
pub fn rank_sessions<'a, I>(sessions: I) -> Vec<&'a RacerSession>
where
    I: IntoIterator<Item = &'a RacerSession>,
{
    sessions
        .into_iter()
        .sorted_by(|a, b| {
            b.session_total()
                .cmp(&a.session_total())
                .then_with(|| a.grid_position().cmp(&b.grid_position()))
        })
        .collect()
}

/// Split `total_pot` across `racers` ranks.
///
/// Returns one amount per rank, rank 1 first. The amounts always add up to
/// exactly `total_pot`: every rank below 1 gets the floor of its weighted
/// share and rank 1 absorbs the remainder.
pub fn split_pot(shares: &[Decimal], total_pot: Money, racers: usize) -> Vec<Money> {
    if racers == 0 {
        return Vec::new();
    }

    let weights: Vec<Decimal> = (0..racers)
        .map(|rank| {
            shares
                .get(rank)
                .copied()
                .filter(|share| share.is_sign_positive())
                .unwrap_or(Decimal::ZERO)
        })
        .collect();
    let total_weight: Decimal = weights.iter().copied().sum();

    let mut payouts = vec![Money::ZERO; racers];
    if total_weight.is_zero() {
        payouts[0] = total_pot;
        return payouts;
    }

    let pot = Decimal::from(total_pot);
    let mut allocated = Money::ZERO;
    for (rank, weight) in weights.iter().enumerate().skip(1) {
        let share = pot
            .checked_mul(*weight)
            .and_then(|scaled| scaled.checked_div(total_weight))
            .map(|exact| exact.floor())
            .and_then(|floored| floored.to_u64())
            .map(Money::from_cents)
            .unwrap_or(Money::ZERO);
        let share = share.min(total_pot.saturating_sub(allocated));
        payouts[rank] = share;
        allocated += share;
    }
    payouts[0] = total_pot.saturating_sub(allocated);
    payouts
}

/// Rank the sessions and compute every payout.
pub fn settle<'a, I>(
    rule: &PayoutRule,
    race_id: Uuid,
    sessions: I,
    duration: Duration,
) -> RaceOutcome
where
    I: IntoIterator<Item = &'a RacerSession>,
{
    let ranked = rank_sessions(sessions);
    let total_pot: Money = ranked.iter().map(|s| s.session_total()).sum();

    let payouts = match rule {
        PayoutRule::OwnPot => ranked.iter().map(|s| s.session_total()).collect(),
        PayoutRule::Split { shares } => split_pot(shares, total_pot, ranked.len()),
    };

    let results = ranked
        .iter()
        .zip(payouts)
        .enumerate()
        .map(|(index, (session, payout))| PayoutLine {
            racer_id: session.racer_id().clone(),
            display_name: session.display_name().to_owned(),
            rank: u32::try_from(index + 1).unwrap_or(u32::MAX),
            session_total: session.session_total(),
            payout,
        })
        .collect();

    RaceOutcome {
        race_id,
        finished_at: time::OffsetDateTime::now_utc(),
        duration,
        total_pot,
        results,
    }
}
