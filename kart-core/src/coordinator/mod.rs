//! Race lifecycle coordinator.
//!
//! [`RaceCoordinator`] is a cheap, cloneable handle to the one league state
//! machine in the process. All mutations go through a single write lock so
//! racer commands, relay donations, admin actions and the ready timer are
//! applied one at a time in arrival order. Snapshots take the read lock and
//! hand back an owned value.
//!
//! # Phases
//!
//! ```text
//! EMPTY -> QUEUING -> STAGING -> RACING -> PAYOUT -> EMPTY
//!              ^          |
//!              +----------+  (ready-check cancelled)
//! ```

mod error;
mod ledger;
mod state;

pub use error::RaceError;
pub use ledger::{LedgerSink, NoopLedger, PersistenceError};
pub use state::{
    DonationReceipt, Enqueued, ExpiryOutcome, RaceState, ReadyOutcome, ResetSummary,
    RosterEntry, StagingTicket,
};

use async_trait::async_trait;
use compact_str::CompactString;
use kart_sdk::{Money, RacePhase, StateSnapshot};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::broadcast::SnapshotSource;
use crate::config::LeagueConfig;
use crate::events::{EventStream, LifecycleEvent};
use crate::payout::{RaceOutcome, duration_ms};

struct Shared {
    state: RwLock<RaceState>,
    ledger: Arc<dyn LedgerSink>,
}

#[derive(Clone)]
pub struct RaceCoordinator {
    inner: Arc<Shared>,
}

impl RaceCoordinator {
    pub fn new(config: LeagueConfig, ledger: Arc<dyn LedgerSink>) -> Self {
        Self {
            inner: Arc::new(Shared {
                state: RwLock::new(RaceState::new(config)),
                ledger,
            }),
        }
    }

    pub async fn phase(&self) -> RacePhase {
        self.inner.state.read().await.phase()
    }

    pub async fn config(&self) -> LeagueConfig {
        self.inner.state.read().await.config().clone()
    }

    pub async fn apply_config(&self, config: LeagueConfig) {
        let mut state = self.inner.state.write().await;
        info!(
            max_racers = config.max_racers,
            min_racers = config.min_racers,
            ready_timeout_ms = duration_ms(config.ready_timeout),
            "League config applied"
        );
        state.apply_config(config);
    }

    pub async fn enqueue(
        &self,
        racer_id: CompactString,
        display_name: String,
    ) -> Result<Enqueued, RaceError> {
        self.inner
            .state
            .write()
            .await
            .enqueue(racer_id, display_name)
    }

    /// Freeze the roster, start the ready-check and arm its timer.
    pub async fn trigger_staging(&self) -> Result<StagingTicket, RaceError> {
        let ticket = self
            .inner
            .state
            .write()
            .await
            .begin_staging(Instant::now())?;
        self.arm_ready_timer(ticket.generation, ticket.deadline);
        Ok(ticket)
    }

    fn arm_ready_timer(&self, generation: u64, deadline: Instant) {
        let coordinator = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            match coordinator.expire_ready_check(generation).await {
                Ok(ExpiryOutcome::Stale) => {}
                Ok(ExpiryOutcome::Started { dropped }) => {
                    info!(generation, dropped = dropped.len(), "Ready check timed out, race started");
                }
                Ok(ExpiryOutcome::Cancelled) => {
                    info!(generation, "Ready check timed out, staging cancelled");
                }
                Err(e) => {
                    warn!(generation, error = %e, "Ready check failed");
                }
            }
        });
    }

    /// Called by the ready timer. A timer from an earlier staging cycle, or
    /// one that fires after the race already started, does nothing.
    pub async fn expire_ready_check(&self, generation: u64) -> Result<ExpiryOutcome, RaceError> {
        self.inner
            .state
            .write()
            .await
            .expire_ready_check(generation, Instant::now())
    }

    pub async fn confirm_ready(&self, racer_id: &str) -> Result<ReadyOutcome, RaceError> {
        self.inner
            .state
            .write()
            .await
            .confirm_ready(racer_id, Instant::now())
    }

    pub async fn update_live_pot(
        &self,
        racer_id: &str,
        amount: Money,
    ) -> Result<DonationReceipt, RaceError> {
        self.inner
            .state
            .write()
            .await
            .update_live_pot(racer_id, amount)
    }

    pub async fn toggle_vibe_bonus(&self, racer_id: &str, active: bool) -> Result<bool, RaceError> {
        self.inner
            .state
            .write()
            .await
            .toggle_vibe_bonus(racer_id, active)
    }

    /// Settle the race and hand the outcome to the ledger.
    ///
    /// The ledger runs after the lock is released. If it fails the outcome
    /// still stands and a `PersistenceWarning` is emitted instead.
    pub async fn end_race(&self) -> Result<RaceOutcome, RaceError> {
        let outcome = self.inner.state.write().await.end_race(Instant::now())?;

        if let Err(e) = self.inner.ledger.record(&outcome).await {
            error!(race_id = %outcome.race_id, error = %e, "Failed to record race outcome");
            self.inner
                .state
                .read()
                .await
                .events()
                .emit(LifecycleEvent::PersistenceWarning {
                    race_id: outcome.race_id,
                    reason: e.to_string(),
                });
        }
        Ok(outcome)
    }

    pub async fn reset(&self) -> Result<ResetSummary, RaceError> {
        self.inner.state.write().await.reset()
    }

    pub async fn last_outcome(&self) -> Option<RaceOutcome> {
        self.inner.state.read().await.last_outcome().cloned()
    }

    pub async fn snapshot(&self) -> StateSnapshot {
        self.inner.state.read().await.snapshot(Instant::now())
    }

    pub async fn subscribe_events(&self) -> EventStream {
        self.inner.state.read().await.events().subscribe()
    }

    /// End every event stream once it has drained.
    pub async fn close_events(&self) {
        self.inner.state.write().await.events_mut().close();
    }
}

#[async_trait]
impl SnapshotSource for RaceCoordinator {
    async fn snapshot(&self) -> StateSnapshot {
        RaceCoordinator::snapshot(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeoutPolicy;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingLedger {
        recorded: Mutex<Vec<uuid::Uuid>>,
    }

    #[async_trait]
    impl LedgerSink for RecordingLedger {
        async fn record(&self, outcome: &RaceOutcome) -> Result<(), PersistenceError> {
            self.recorded.lock().unwrap().push(outcome.race_id);
            Ok(())
        }
    }

    struct BrokenLedger;

    #[async_trait]
    impl LedgerSink for BrokenLedger {
        async fn record(&self, _outcome: &RaceOutcome) -> Result<(), PersistenceError> {
            Err(PersistenceError::Unavailable("disk on fire".to_owned()))
        }
    }

    fn coordinator() -> RaceCoordinator {
        RaceCoordinator::new(LeagueConfig::default(), Arc::new(NoopLedger))
    }

    async fn queue(coordinator: &RaceCoordinator, racers: &[&str]) {
        for id in racers {
            coordinator
                .enqueue((*id).into(), id.to_uppercase())
                .await
                .unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_racer_race_end_to_end() {
        let ledger = Arc::new(RecordingLedger::default());
        let coordinator = RaceCoordinator::new(LeagueConfig::default(), ledger.clone());
        queue(&coordinator, &["r1", "r2", "r3"]).await;

        coordinator.trigger_staging().await.unwrap();
        for id in ["r1", "r2", "r3"] {
            coordinator.confirm_ready(id).await.unwrap();
        }
        assert_eq!(coordinator.phase().await, RacePhase::Racing);

        coordinator.update_live_pot("r1", Money::from_cents(500)).await.unwrap();
        coordinator.toggle_vibe_bonus("r1", true).await.unwrap();
        coordinator.update_live_pot("r1", Money::from_cents(500)).await.unwrap();

        let outcome = coordinator.end_race().await.unwrap();
        let winner = outcome.winner().unwrap();
        assert_eq!(winner.racer_id, "r1");
        assert_eq!(winner.payout, Money::from_cents(1250));
        assert_eq!(*ledger.recorded.lock().unwrap(), vec![outcome.race_id]);
        assert_eq!(coordinator.last_outcome().await, Some(outcome));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_timer_fails_with_one_of_two_confirmed() {
        let coordinator = coordinator();
        let mut events = coordinator.subscribe_events().await;
        queue(&coordinator, &["r1", "r2"]).await;
        coordinator.trigger_staging().await.unwrap();
        coordinator.confirm_ready("r1").await.unwrap();

        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(coordinator.phase().await, RacePhase::Queuing);
        let snapshot = coordinator.snapshot().await;
        assert_eq!(snapshot.roster.len(), 2);
        let kinds: Vec<_> = events.drain().iter().map(LifecycleEvent::kind).collect();
        assert!(kinds.contains(&"ready_check_failed"));
        assert_eq!(kinds.last(), Some(&"staging_cancelled"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_timer_cancels_under_cancel_policy() {
        let coordinator = RaceCoordinator::new(
            LeagueConfig {
                timeout_policy: TimeoutPolicy::Cancel,
                ..LeagueConfig::default()
            },
            Arc::new(NoopLedger),
        );
        queue(&coordinator, &["r1", "r2", "r3"]).await;
        coordinator.trigger_staging().await.unwrap();
        coordinator.confirm_ready("r1").await.unwrap();
        coordinator.confirm_ready("r2").await.unwrap();

        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(coordinator.phase().await, RacePhase::Queuing);
        assert_eq!(coordinator.snapshot().await.roster.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_timer_drops_unconfirmed_racer() {
        let coordinator = coordinator();
        queue(&coordinator, &["r1", "r2", "r3"]).await;
        coordinator.trigger_staging().await.unwrap();
        coordinator.confirm_ready("r2").await.unwrap();
        coordinator.confirm_ready("r3").await.unwrap();

        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(coordinator.phase().await, RacePhase::Racing);
        let ids: Vec<_> = coordinator
            .snapshot()
            .await
            .roster
            .into_iter()
            .map(|r| r.racer_id)
            .collect();
        assert_eq!(ids, vec!["r2", "r3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_old_timer_does_not_touch_new_staging() {
        let coordinator = RaceCoordinator::new(
            LeagueConfig {
                timeout_policy: TimeoutPolicy::Cancel,
                ready_timeout: Duration::from_secs(5),
                ..LeagueConfig::default()
            },
            Arc::new(NoopLedger),
        );
        queue(&coordinator, &["r1", "r2"]).await;
        let first = coordinator.trigger_staging().await.unwrap();
        // Cancel the first cycle by hand, then restage 3s later.
        coordinator.expire_ready_check(first.generation).await.unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        let second = coordinator.trigger_staging().await.unwrap();

        // The first timer fires here; the second is still 3s away.
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(coordinator.phase().await, RacePhase::Staging);
        assert_eq!(coordinator.snapshot().await.race_id, Some(second.race_id));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(coordinator.phase().await, RacePhase::Queuing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_donations_are_all_counted() {
        let coordinator = coordinator();
        queue(&coordinator, &["r1"]).await;
        coordinator.trigger_staging().await.unwrap();
        coordinator.confirm_ready("r1").await.unwrap();

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move {
                    coordinator
                        .update_live_pot("r1", Money::from_cents(100))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(coordinator.snapshot().await.total_pot, Money::from_cents(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ledger_failure_keeps_outcome_and_warns() {
        let coordinator = RaceCoordinator::new(LeagueConfig::default(), Arc::new(BrokenLedger));
        let mut events = coordinator.subscribe_events().await;
        queue(&coordinator, &["r1"]).await;
        coordinator.trigger_staging().await.unwrap();
        coordinator.confirm_ready("r1").await.unwrap();

        let outcome = coordinator.end_race().await.unwrap();
        assert_eq!(coordinator.phase().await, RacePhase::Payout);

        let last = events.drain().pop().unwrap();
        assert_eq!(
            last,
            LifecycleEvent::PersistenceWarning {
                race_id: outcome.race_id,
                reason: "ledger unavailable: disk on fire".to_owned(),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_events_ends_subscribers() {
        let coordinator = coordinator();
        let mut events = coordinator.subscribe_events().await;
        queue(&coordinator, &["r1"]).await;
        coordinator.close_events().await;

        assert_eq!(events.next().await.map(|e| e.kind()), Some("racer_queued"));
        assert_eq!(events.next().await, None);
        assert_eq!(coordinator.subscribe_events().await.next().await, None);
    }
}
