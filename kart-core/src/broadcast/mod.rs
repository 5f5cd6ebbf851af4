//! State snapshot broadcast hub.
//!
//! The hub pulls a snapshot from its [`SnapshotSource`] at a fixed cadence
//! and pushes it to every registered [`SnapshotSink`]. Delivery never waits
//! on a slow viewer: a sink that cannot take the frame right now is treated
//! as dead and pruned.

mod sink;

pub use sink::{ChannelSink, DeliveryError, SnapshotSink, channel_sink};

use async_trait::async_trait;
use kart_sdk::StateSnapshot;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Anything that can produce the current league state.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn snapshot(&self) -> StateSnapshot;
}

/// Process-unique handle for one registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub delivered: usize,
    pub pruned: usize,
}

type Registry = HashMap<SubscriberId, Arc<dyn SnapshotSink>>;

pub struct BroadcastHub<S> {
    source: S,
    subscribers: Arc<Mutex<Registry>>,
    next_id: Arc<AtomicU64>,
}

impl<S: Clone> Clone for BroadcastHub<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            subscribers: self.subscribers.clone(),
            next_id: self.next_id.clone(),
        }
    }
}

impl<S: SnapshotSource> BroadcastHub<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            subscribers: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Push the current state to a new subscriber, then add it.
    ///
    /// A sink whose first push fails is never added and the error is
    /// returned. Ticks only reach the sink after that first push.
    pub async fn register(&self, sink: Arc<dyn SnapshotSink>) -> Result<SubscriberId, DeliveryError> {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let snapshot = Arc::new(self.source.snapshot().await);
        if let Err(e) = sink.deliver(snapshot) {
            debug!(subscriber = %id, error = %e, "Initial snapshot failed, subscriber dropped");
            return Err(e);
        }
        self.subscribers.lock().await.insert(id, sink);
        debug!(subscriber = %id, "Subscriber registered");
        Ok(id)
    }

    /// Removing an unknown id is a no-op. Dropping the hub's handle
    /// releases the sink.
    pub async fn unregister(&self, id: SubscriberId) {
        if self.subscribers.lock().await.remove(&id).is_some() {
            debug!(subscriber = %id, "Subscriber unregistered");
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    /// Push one snapshot to every subscriber, pruning the ones that fail.
    pub async fn tick(&self) -> TickReport {
        let snapshot = Arc::new(self.source.snapshot().await);
        let targets: Vec<(SubscriberId, Arc<dyn SnapshotSink>)> = self
            .subscribers
            .lock()
            .await
            .iter()
            .map(|(id, sink)| (*id, sink.clone()))
            .collect();

        let mut report = TickReport::default();
        let mut failed = Vec::new();
        for (id, sink) in targets {
            match sink.deliver(snapshot.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    debug!(subscriber = %id, error = %e, "Delivery failed, pruning subscriber");
                    failed.push(id);
                }
            }
        }

        if !failed.is_empty() {
            let mut subscribers = self.subscribers.lock().await;
            for id in &failed {
                subscribers.remove(id);
            }
            report.pruned = failed.len();
        }
        report
    }

    /// Tick every `interval` until shutdown, then drop every subscriber.
    pub async fn run(self, interval: Duration, mut shutdown_rx: watch::Receiver<bool>) {
        info!(interval_ms = interval.as_millis() as u64, "Broadcast hub started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                res = shutdown_rx.changed() => {
                    if res.is_err() || *shutdown_rx.borrow() {
                        info!("Broadcast hub received shutdown signal");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    let report = self.tick().await;
                    if report.pruned > 0 {
                        debug!(delivered = report.delivered, pruned = report.pruned, "Broadcast tick");
                    }
                }
            }
        }

        let closed = {
            let mut subscribers = self.subscribers.lock().await;
            let closed = subscribers.len();
            subscribers.clear();
            closed
        };
        info!(closed, "Broadcast hub shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kart_sdk::RacePhase;
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone)]
    struct FixedSource(StateSnapshot);

    #[async_trait]
    impl SnapshotSource for FixedSource {
        async fn snapshot(&self) -> StateSnapshot {
            self.0.clone()
        }
    }

    fn hub() -> BroadcastHub<FixedSource> {
        BroadcastHub::new(FixedSource(StateSnapshot::empty(4)))
    }

    /// Accepts `budget` deliveries, then fails forever.
    struct FlakySink {
        budget: usize,
        seen: AtomicUsize,
    }

    impl FlakySink {
        fn new(budget: usize) -> Arc<Self> {
            Arc::new(Self {
                budget,
                seen: AtomicUsize::new(0),
            })
        }
    }

    impl SnapshotSink for FlakySink {
        fn deliver(&self, _snapshot: Arc<StateSnapshot>) -> Result<(), DeliveryError> {
            let seen = self.seen.fetch_add(1, Ordering::SeqCst);
            if seen < self.budget {
                Ok(())
            } else {
                Err(DeliveryError::Closed)
            }
        }
    }

    #[tokio::test]
    async fn test_register_pushes_initial_snapshot() {
        let hub = hub();
        let (sink, mut rx) = channel_sink(4);
        hub.register(Arc::new(sink)).await.unwrap();

        let first = rx.try_recv().unwrap();
        assert_eq!(first.phase, RacePhase::Empty);
        assert_eq!(hub.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn test_failed_initial_push_is_not_registered() {
        let hub = hub();
        let err = hub.register(FlakySink::new(0)).await.unwrap_err();
        assert_eq!(err, DeliveryError::Closed);
        assert_eq!(hub.subscriber_count().await, 0);
    }

    /// Holds its first snapshot until released; later calls answer at once.
    #[derive(Clone)]
    struct GatedSource {
        calls: Arc<AtomicUsize>,
        gate: Arc<tokio::sync::Notify>,
    }

    #[async_trait]
    impl SnapshotSource for GatedSource {
        async fn snapshot(&self) -> StateSnapshot {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                self.gate.notified().await;
            }
            StateSnapshot::empty(4)
        }
    }

    #[tokio::test]
    async fn test_tick_during_registration_does_not_crowd_out_first_frame() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let hub = BroadcastHub::new(GatedSource {
            calls: Arc::new(AtomicUsize::new(0)),
            gate: gate.clone(),
        });
        let (sink, mut rx) = channel_sink(1);

        let registering = tokio::spawn({
            let hub = hub.clone();
            async move { hub.register(Arc::new(sink)).await }
        });
        tokio::task::yield_now().await;

        // The viewer is mid-registration, so this tick must not reach it.
        assert_eq!(hub.tick().await, TickReport { delivered: 0, pruned: 0 });

        gate.notify_one();
        registering.await.unwrap().unwrap();
        assert_eq!(hub.subscriber_count().await, 1);
        assert_eq!(rx.try_recv().unwrap().phase, RacePhase::Empty);
    }

    #[tokio::test]
    async fn test_failing_subscriber_does_not_affect_others() {
        let hub = hub();
        let (healthy, mut healthy_rx) = channel_sink(8);
        hub.register(Arc::new(healthy)).await.unwrap();
        // Survives registration, dies on the first tick.
        hub.register(FlakySink::new(1)).await.unwrap();

        let report = hub.tick().await;
        assert_eq!(report, TickReport { delivered: 1, pruned: 1 });
        assert_eq!(hub.subscriber_count().await, 1);

        let report = hub.tick().await;
        assert_eq!(report, TickReport { delivered: 1, pruned: 0 });
        // Initial push plus two ticks.
        for _ in 0..3 {
            healthy_rx.try_recv().unwrap();
        }
    }

    #[tokio::test]
    async fn test_full_channel_counts_as_failure() {
        let hub = hub();
        let (sink, _rx) = channel_sink(1);
        hub.register(Arc::new(sink)).await.unwrap();
        // The receiver never drains, so the buffer is still full.
        assert_eq!(hub.tick().await, TickReport { delivered: 0, pruned: 1 });
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_pruned() {
        let hub = hub();
        let (sink, rx) = channel_sink(4);
        hub.register(Arc::new(sink)).await.unwrap();
        drop(rx);
        assert_eq!(hub.tick().await.pruned, 1);
        assert_eq!(hub.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let hub = hub();
        let (sink, _rx) = channel_sink(4);
        let id = hub.register(Arc::new(sink)).await.unwrap();
        hub.unregister(id).await;
        hub.unregister(id).await;
        assert_eq!(hub.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_subscriber_ids_are_unique() {
        let hub = hub();
        let (a, _rx_a) = channel_sink(4);
        let (b, _rx_b) = channel_sink(4);
        let first = hub.register(Arc::new(a)).await.unwrap();
        let second = hub.register(Arc::new(b)).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_until_shutdown_then_closes_subscribers() {
        let hub = hub();
        let (sink, mut rx) = channel_sink(16);
        hub.register(Arc::new(sink)).await.unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(hub.clone().run(Duration::from_millis(500), shutdown_rx));

        tokio::time::sleep(Duration::from_millis(1200)).await;
        shutdown_tx.send(true).unwrap();
        task.await.unwrap();

        // Initial push, then ticks at 0, 500 and 1000 ms.
        let mut frames = 0;
        while rx.recv().await.is_some() {
            frames += 1;
        }
        assert_eq!(frames, 4);
        assert_eq!(hub.subscriber_count().await, 0);
    }
}
