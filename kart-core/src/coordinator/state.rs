//! The coordinator's state machine.
//!
//! Every transition is a plain synchronous method taking the current time,
//! so the rules can be exercised without a runtime. [`super::RaceCoordinator`]
//! owns one of these behind a lock and adds the timer and the ledger.

use compact_str::CompactString;
use kart_sdk::objects::admin::StagingResponse;
use kart_sdk::objects::racer::ReadyResponse;
use kart_sdk::{Money, RacePhase, RacerStanding, StateSnapshot};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use super::error::RaceError;
use crate::config::{LeagueConfig, TimeoutPolicy};
use crate::events::{CancelReason, EventFeed, LifecycleEvent};
use crate::payout::{self, RaceOutcome, duration_ms};
use crate::session::RacerSession;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub racer_id: CompactString,
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enqueued {
    pub grid_position: usize,
    pub queued: usize,
    pub max_racers: usize,
}

/// Handed back when a ready-check starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingTicket {
    pub race_id: Uuid,
    pub roster: Vec<CompactString>,
    pub ready_timeout: Duration,
    pub generation: u64,
    pub deadline: Instant,
}

impl StagingTicket {
    pub fn to_response(&self) -> StagingResponse {
        StagingResponse {
            race_id: self.race_id,
            roster: self.roster.clone(),
            ready_timeout_ms: duration_ms(self.ready_timeout),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyOutcome {
    Waiting { confirmed: usize, total: usize },
    RaceStarted { total: usize },
    AlreadyConfirmed { confirmed: usize, total: usize },
}

impl From<ReadyOutcome> for ReadyResponse {
    fn from(value: ReadyOutcome) -> Self {
        match value {
            ReadyOutcome::Waiting { confirmed, total } => ReadyResponse::Waiting { confirmed, total },
            ReadyOutcome::RaceStarted { total } => ReadyResponse::RaceStarted { total },
            ReadyOutcome::AlreadyConfirmed { confirmed, total } => {
                ReadyResponse::AlreadyConfirmed { confirmed, total }
            }
        }
    }
}

/// What a ready timer did when it fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpiryOutcome {
    /// The timer belonged to a staging cycle that is already over.
    Stale,
    /// Unconfirmed racers were dropped and the race started.
    Started { dropped: Vec<CompactString> },
    /// The grid went back to the queue.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonationReceipt {
    pub racer_id: CompactString,
    pub credited: Money,
    pub session_total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetSummary {
    pub race_id: Option<Uuid>,
    pub racers: Vec<CompactString>,
}

#[derive(Debug)]
pub struct RaceState {
    config: LeagueConfig,
    phase: RacePhase,
    roster: Vec<RosterEntry>,
    sessions: HashMap<CompactString, RacerSession>,
    confirmations: HashSet<CompactString>,
    ready_deadline: Option<Instant>,
    race_id: Option<Uuid>,
    staging_generation: u64,
    race_started_at: Option<Instant>,
    outcome: Option<RaceOutcome>,
    events: EventFeed,
}

impl RaceState {
    pub fn new(config: LeagueConfig) -> Self {
        Self {
            config,
            phase: RacePhase::Empty,
            roster: Vec::new(),
            sessions: HashMap::new(),
            confirmations: HashSet::new(),
            ready_deadline: None,
            race_id: None,
            staging_generation: 0,
            race_started_at: None,
            outcome: None,
            events: EventFeed::new(),
        }
    }

    pub fn phase(&self) -> RacePhase {
        self.phase
    }

    pub fn config(&self) -> &LeagueConfig {
        &self.config
    }

    pub fn events(&self) -> &EventFeed {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventFeed {
        &mut self.events
    }

    pub fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }

    pub fn session(&self, racer_id: &str) -> Option<&RacerSession> {
        self.sessions.get(racer_id)
    }

    pub fn last_outcome(&self) -> Option<&RaceOutcome> {
        self.outcome.as_ref()
    }

    pub fn staging_generation(&self) -> u64 {
        self.staging_generation
    }

    /// Takes effect for the next operation. Queued racers are never evicted
    /// by a lower `max_racers`.
    pub fn apply_config(&mut self, config: LeagueConfig) {
        self.config = config;
    }

    fn wrong_phase(&self, operation: &'static str) -> RaceError {
        RaceError::WrongPhase {
            operation,
            phase: self.phase,
        }
    }

    fn roster_ids(&self) -> Vec<CompactString> {
        self.roster.iter().map(|entry| entry.racer_id.clone()).collect()
    }

    pub fn enqueue(
        &mut self,
        racer_id: CompactString,
        display_name: String,
    ) -> Result<Enqueued, RaceError> {
        if !matches!(self.phase, RacePhase::Empty | RacePhase::Queuing) {
            return Err(self.wrong_phase("enqueue"));
        }
        if self.roster.iter().any(|entry| entry.racer_id == racer_id) {
            return Err(RaceError::AlreadyQueued { racer_id });
        }
        let max_racers = self.config.max_racers;
        if self.roster.len() >= max_racers {
            return Err(RaceError::RosterFull { max_racers });
        }

        let grid_position = self.roster.len();
        self.roster.push(RosterEntry {
            racer_id: racer_id.clone(),
            display_name: display_name.clone(),
        });
        self.phase = RacePhase::Queuing;

        let queued = self.roster.len();
        debug!(racer_id = %racer_id, grid_position, queued, "Racer queued");
        self.events.emit(LifecycleEvent::RacerQueued {
            racer_id,
            display_name,
            grid_position,
            queued,
            max_racers,
        });
        Ok(Enqueued {
            grid_position,
            queued,
            max_racers,
        })
    }

    /// Freeze the roster and open the ready-check.
    pub fn begin_staging(&mut self, now: Instant) -> Result<StagingTicket, RaceError> {
        if self.phase != RacePhase::Queuing || self.roster.is_empty() {
            return Err(self.wrong_phase("start staging"));
        }

        let ready_timeout = self.config.ready_timeout;
        let deadline = now
            .checked_add(ready_timeout)
            .ok_or(RaceError::ReadyTimeoutOutOfRange {
                ready_timeout_secs: ready_timeout.as_secs(),
            })?;

        self.staging_generation += 1;
        let race_id = Uuid::now_v7();

        self.sessions = self
            .roster
            .iter()
            .enumerate()
            .map(|(grid_position, entry)| {
                let session = RacerSession::new(
                    entry.racer_id.clone(),
                    entry.display_name.clone(),
                    grid_position,
                );
                (entry.racer_id.clone(), session)
            })
            .collect();
        self.confirmations.clear();
        self.ready_deadline = Some(deadline);
        self.race_id = Some(race_id);
        self.phase = RacePhase::Staging;

        let roster = self.roster_ids();
        info!(%race_id, racers = roster.len(), "Staging started");
        self.events.emit(LifecycleEvent::StagingStarted {
            race_id,
            roster: roster.clone(),
            ready_timeout,
        });
        Ok(StagingTicket {
            race_id,
            roster,
            ready_timeout,
            generation: self.staging_generation,
            deadline,
        })
    }

    pub fn confirm_ready(
        &mut self,
        racer_id: &str,
        now: Instant,
    ) -> Result<ReadyOutcome, RaceError> {
        if self.phase != RacePhase::Staging {
            return Err(self.wrong_phase("confirm ready"));
        }
        if !self.sessions.contains_key(racer_id) {
            return Err(RaceError::UnknownRacer {
                racer_id: racer_id.into(),
            });
        }

        let total = self.roster.len();
        if self.confirmations.contains(racer_id) {
            return Ok(ReadyOutcome::AlreadyConfirmed {
                confirmed: self.confirmations.len(),
                total,
            });
        }

        self.confirmations.insert(racer_id.into());
        let confirmed = self.confirmations.len();
        self.events.emit(LifecycleEvent::ReadyProgress {
            racer_id: racer_id.into(),
            confirmed,
            total,
        });

        if confirmed == total {
            self.start_race(now);
            Ok(ReadyOutcome::RaceStarted { total })
        } else {
            Ok(ReadyOutcome::Waiting { confirmed, total })
        }
    }

    /// Apply the timeout policy for staging cycle `generation`.
    ///
    /// Anything other than the current cycle still in staging is a no-op.
    pub fn expire_ready_check(
        &mut self,
        generation: u64,
        now: Instant,
    ) -> Result<ExpiryOutcome, RaceError> {
        if self.phase != RacePhase::Staging || generation != self.staging_generation {
            return Ok(ExpiryOutcome::Stale);
        }

        match self.config.timeout_policy {
            TimeoutPolicy::Cancel => {
                self.cancel_staging(CancelReason::ReadyTimeout);
                Ok(ExpiryOutcome::Cancelled)
            }
            TimeoutPolicy::DropUnconfirmed => {
                let confirmed = self.confirmations.len();
                let required = self.config.min_racers.max(1);
                if confirmed < required {
                    if let Some(race_id) = self.race_id {
                        self.events.emit(LifecycleEvent::ReadyCheckFailed {
                            race_id,
                            confirmed,
                            required,
                        });
                    }
                    self.cancel_staging(CancelReason::InsufficientRacers {
                        confirmed,
                        required,
                    });
                    return Err(RaceError::InsufficientRacers {
                        confirmed,
                        required,
                    });
                }

                let dropped = self.drop_unconfirmed();
                self.start_race(now);
                Ok(ExpiryOutcome::Started { dropped })
            }
        }
    }

    fn drop_unconfirmed(&mut self) -> Vec<CompactString> {
        let (kept, dropped): (Vec<_>, Vec<_>) = std::mem::take(&mut self.roster)
            .into_iter()
            .partition(|entry| self.confirmations.contains(&entry.racer_id));
        self.roster = kept;

        let dropped: Vec<CompactString> = dropped.into_iter().map(|entry| entry.racer_id).collect();
        for racer_id in &dropped {
            self.sessions.remove(racer_id);
        }
        for (grid_position, entry) in self.roster.iter().enumerate() {
            if let Some(session) = self.sessions.get_mut(&entry.racer_id) {
                session.set_grid_position(grid_position);
            }
        }

        if let Some(race_id) = self.race_id {
            info!(%race_id, dropped = dropped.len(), "Dropped unconfirmed racers");
            self.events.emit(LifecycleEvent::RacersDropped {
                race_id,
                dropped: dropped.clone(),
                remaining: self.roster.len(),
            });
        }
        dropped
    }

    fn cancel_staging(&mut self, reason: CancelReason) {
        let race_id = self.race_id.take();
        self.sessions.clear();
        self.confirmations.clear();
        self.ready_deadline = None;
        self.phase = if self.roster.is_empty() {
            RacePhase::Empty
        } else {
            RacePhase::Queuing
        };

        if let Some(race_id) = race_id {
            info!(%race_id, %reason, "Staging cancelled");
            self.events.emit(LifecycleEvent::StagingCancelled {
                race_id,
                reason,
                returned: self.roster_ids(),
            });
        }
    }

    fn start_race(&mut self, now: Instant) {
        self.phase = RacePhase::Racing;
        self.ready_deadline = None;
        self.race_started_at = Some(now);

        if let Some(race_id) = self.race_id {
            info!(%race_id, racers = self.roster.len(), "Race started");
            self.events.emit(LifecycleEvent::RaceStart {
                race_id,
                lobby_code: self.config.lobby_code.clone(),
                racers: self.roster_ids(),
            });
        }
    }

    fn racing_session(
        &mut self,
        operation: &'static str,
        racer_id: &str,
    ) -> Result<&mut RacerSession, RaceError> {
        if self.phase != RacePhase::Racing {
            return Err(self.wrong_phase(operation));
        }
        self.sessions
            .get_mut(racer_id)
            .ok_or_else(|| RaceError::UnknownRacer {
                racer_id: racer_id.into(),
            })
    }

    pub fn update_live_pot(
        &mut self,
        racer_id: &str,
        amount: Money,
    ) -> Result<DonationReceipt, RaceError> {
        let multiplier = self.config.vibe_multiplier;
        let session = self.racing_session("accept donations", racer_id)?;
        let credited = session.apply_donation(amount, multiplier);
        let receipt = DonationReceipt {
            racer_id: session.racer_id().clone(),
            credited,
            session_total: session.session_total(),
        };
        debug!(
            racer_id = %receipt.racer_id,
            amount = amount.cents(),
            credited = credited.cents(),
            session_total = receipt.session_total.cents(),
            "Donation applied"
        );
        Ok(receipt)
    }

    /// Returns whether the flag actually changed.
    pub fn toggle_vibe_bonus(&mut self, racer_id: &str, active: bool) -> Result<bool, RaceError> {
        let session = self.racing_session("toggle vibe bonus", racer_id)?;
        let changed = session.set_vibe_bonus(active);
        if changed {
            let racer_id = session.racer_id().clone();
            self.events
                .emit(LifecycleEvent::VibeBonusChanged { racer_id, active });
        }
        Ok(changed)
    }

    pub fn end_race(&mut self, now: Instant) -> Result<RaceOutcome, RaceError> {
        if self.phase != RacePhase::Racing {
            return Err(self.wrong_phase("end race"));
        }
        let Some(race_id) = self.race_id else {
            return Err(self.wrong_phase("end race"));
        };

        let duration = self
            .race_started_at
            .map(|started| now.saturating_duration_since(started))
            .unwrap_or_default();
        let outcome = payout::settle(
            &self.config.payout_rule,
            race_id,
            self.sessions.values(),
            duration,
        );

        self.phase = RacePhase::Payout;
        self.outcome = Some(outcome.clone());
        info!(
            %race_id,
            total_pot = outcome.total_pot.cents(),
            duration_ms = duration_ms(duration),
            "Race finished"
        );
        self.events.emit(LifecycleEvent::RaceFinished {
            race_id,
            total_pot: outcome.total_pot,
            results: outcome.results.clone(),
            duration,
        });
        Ok(outcome)
    }

    pub fn reset(&mut self) -> Result<ResetSummary, RaceError> {
        if self.phase != RacePhase::Payout {
            return Err(self.wrong_phase("reset"));
        }

        let summary = ResetSummary {
            race_id: self.race_id.take(),
            racers: self.roster_ids(),
        };
        self.roster.clear();
        self.sessions.clear();
        self.confirmations.clear();
        self.ready_deadline = None;
        self.race_started_at = None;
        self.outcome = None;
        self.phase = RacePhase::Empty;

        self.events.emit(LifecycleEvent::Reset {
            race_id: summary.race_id,
            racers: summary.racers.len(),
        });
        Ok(summary)
    }

    pub fn snapshot(&self, now: Instant) -> StateSnapshot {
        let roster = self
            .roster
            .iter()
            .enumerate()
            .map(|(grid_position, entry)| {
                let session = self.sessions.get(&entry.racer_id);
                let line = self
                    .outcome
                    .as_ref()
                    .and_then(|outcome| outcome.line(&entry.racer_id));
                RacerStanding {
                    racer_id: entry.racer_id.clone(),
                    display_name: entry.display_name.clone(),
                    grid_position,
                    ready: self.confirmations.contains(&entry.racer_id),
                    session_total: session.map(RacerSession::session_total).unwrap_or_default(),
                    vibe_bonus_active: session.is_some_and(RacerSession::vibe_bonus_active),
                    rank: line.map(|line| line.rank),
                    payout: line.map(|line| line.payout),
                }
            })
            .collect();

        let elapsed = match (self.phase, &self.outcome, self.race_started_at) {
            (RacePhase::Payout, Some(outcome), _) => outcome.duration,
            (RacePhase::Racing, _, Some(started)) => now.saturating_duration_since(started),
            _ => Duration::ZERO,
        };

        StateSnapshot {
            phase: self.phase,
            race_id: self.race_id,
            roster,
            total_pot: self.sessions.values().map(RacerSession::session_total).sum(),
            elapsed_ms: duration_ms(elapsed),
            ready_deadline_ms: self
                .ready_deadline
                .map(|deadline| duration_ms(deadline.saturating_duration_since(now))),
            max_racers: self.config.max_racers,
        }
    }
}
