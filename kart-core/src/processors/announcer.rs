//! EventAnnouncer processor.
//!
//! Writes each lifecycle event to the log with its kind and race id as
//! fields and the human-readable line as the message. Race starts and
//! results are logged at `info`, everything else at `debug`, except
//! ledger failures which are `warn`.

use crate::events::{EventStream, LifecycleEvent};
use kanau::processor::Processor;
use std::convert::Infallible;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Default, Clone, Copy)]
pub struct EventAnnouncer;

impl EventAnnouncer {
    pub fn new() -> Self {
        Self
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>, mut events: EventStream) {
        info!("EventAnnouncer started");

        loop {
            tokio::select! {
                biased;

                res = shutdown_rx.changed() => {
                    if res.is_err() || *shutdown_rx.borrow() {
                        info!("EventAnnouncer received shutdown signal");
                        for event in events.drain() {
                            let _ = self.process(event).await;
                        }
                        break;
                    }
                }

                event = events.next() => match event {
                    Some(event) => {
                        let _ = self.process(event).await;
                    }
                    None => {
                        info!("Event feed closed");
                        break;
                    }
                }
            }
        }

        info!("EventAnnouncer shutdown complete");
    }
}

impl Processor<LifecycleEvent> for EventAnnouncer {
    type Output = ();
    type Error = Infallible;

    async fn process(&self, event: LifecycleEvent) -> Result<(), Infallible> {
        let kind = event.kind();
        let race_id = event.race_id().map(|id| id.to_string());
        match &event {
            LifecycleEvent::RaceStart { .. }
            | LifecycleEvent::RaceFinished { .. }
            | LifecycleEvent::StagingStarted { .. }
            | LifecycleEvent::StagingCancelled { .. } => {
                info!(kind, race_id = race_id.as_deref(), "{event}");
            }
            LifecycleEvent::PersistenceWarning { .. } | LifecycleEvent::ReadyCheckFailed { .. } => {
                warn!(kind, race_id = race_id.as_deref(), "{event}");
            }
            _ => {
                debug!(kind, race_id = race_id.as_deref(), "{event}");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventFeed;

    #[tokio::test]
    async fn test_run_ends_when_feed_closes() {
        let mut feed = EventFeed::new();
        let events = feed.subscribe();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        feed.emit(LifecycleEvent::Reset {
            race_id: None,
            racers: 0,
        });
        feed.close();

        EventAnnouncer::new().run(shutdown_rx, events).await;
    }

    #[tokio::test]
    async fn test_run_ends_on_shutdown() {
        let feed = EventFeed::new();
        let events = feed.subscribe();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(EventAnnouncer::new().run(shutdown_rx, events));

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
        drop(feed);
    }
}
