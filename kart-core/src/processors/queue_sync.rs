//! QueueSync processor.
//!
//! Keeps `queue_entries` in step with the coordinator so a restart can
//! rebuild the grid:
//!
//! - race start moves the racers' entries to `racing`
//! - racers dropped at a ready check are `withdrawn`
//! - a reset closes every `racing` entry as `finished`
//!
//! A cancelled staging needs nothing: those entries never left `queued`.

use crate::entities::QueueStatus;
use crate::entities::queue::{FinishRacingEntries, UpdateQueueStatus};
use crate::events::{EventStream, LifecycleEvent};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// The database write a lifecycle event calls for.
#[derive(Debug, Clone)]
pub enum QueueSyncAction {
    Update(UpdateQueueStatus),
    FinishRacing,
}

impl QueueSyncAction {
    pub fn for_event(event: &LifecycleEvent) -> Option<Self> {
        match event {
            LifecycleEvent::RaceStart { racers, .. } => {
                Some(QueueSyncAction::Update(UpdateQueueStatus {
                    racer_ids: racers.clone(),
                    to: QueueStatus::Racing,
                }))
            }
            LifecycleEvent::RacersDropped { dropped, .. } => {
                Some(QueueSyncAction::Update(UpdateQueueStatus {
                    racer_ids: dropped.clone(),
                    to: QueueStatus::Withdrawn,
                }))
            }
            LifecycleEvent::Reset { .. } => Some(QueueSyncAction::FinishRacing),
            _ => None,
        }
    }
}

pub struct QueueSync {
    db: DatabaseProcessor,
}

impl QueueSync {
    pub fn new(db: DatabaseProcessor) -> Self {
        Self { db }
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>, mut events: EventStream) {
        info!("QueueSync started");

        loop {
            tokio::select! {
                biased;

                res = shutdown_rx.changed() => {
                    if res.is_err() || *shutdown_rx.borrow() {
                        info!("QueueSync received shutdown signal");
                        for event in events.drain() {
                            self.handle(event).await;
                        }
                        break;
                    }
                }

                event = events.next() => match event {
                    Some(event) => self.handle(event).await,
                    None => {
                        info!("Event feed closed");
                        break;
                    }
                }
            }
        }

        info!("QueueSync shutdown complete");
    }

    async fn handle(&self, event: LifecycleEvent) {
        let kind = event.kind();
        match self.process(event).await {
            Ok(0) => {}
            Ok(rows) => debug!(kind, rows, "Queue entries updated"),
            Err(e) => error!(kind, error = %e, "Failed to sync queue entries"),
        }
    }
}

impl Processor<LifecycleEvent> for QueueSync {
    type Output = u64;
    type Error = sqlx::Error;

    async fn process(&self, event: LifecycleEvent) -> Result<u64, sqlx::Error> {
        match QueueSyncAction::for_event(&event) {
            Some(QueueSyncAction::Update(update)) => self.db.process(update).await,
            Some(QueueSyncAction::FinishRacing) => self.db.process(FinishRacingEntries).await,
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CancelReason;
    use uuid::Uuid;

    #[test]
    fn test_race_start_marks_racers_racing() {
        let event = LifecycleEvent::RaceStart {
            race_id: Uuid::nil(),
            lobby_code: "8841-COZY".to_owned(),
            racers: vec!["r1".into(), "r2".into()],
        };
        let Some(QueueSyncAction::Update(update)) = QueueSyncAction::for_event(&event) else {
            panic!("expected an update");
        };
        assert_eq!(update.to, QueueStatus::Racing);
        assert_eq!(update.racer_ids, vec!["r1", "r2"]);
    }

    #[test]
    fn test_dropped_racers_are_withdrawn() {
        let event = LifecycleEvent::RacersDropped {
            race_id: Uuid::nil(),
            dropped: vec!["r3".into()],
            remaining: 2,
        };
        let Some(QueueSyncAction::Update(update)) = QueueSyncAction::for_event(&event) else {
            panic!("expected an update");
        };
        assert_eq!(update.to, QueueStatus::Withdrawn);
        assert_eq!(update.racer_ids, vec!["r3"]);
    }

    #[test]
    fn test_reset_finishes_racing_entries() {
        let event = LifecycleEvent::Reset {
            race_id: Some(Uuid::nil()),
            racers: 3,
        };
        assert!(matches!(
            QueueSyncAction::for_event(&event),
            Some(QueueSyncAction::FinishRacing)
        ));
    }

    #[test]
    fn test_cancelled_staging_touches_nothing() {
        let event = LifecycleEvent::StagingCancelled {
            race_id: Uuid::nil(),
            reason: CancelReason::ReadyTimeout,
            returned: vec!["r1".into()],
        };
        assert!(QueueSyncAction::for_event(&event).is_none());
    }
}
