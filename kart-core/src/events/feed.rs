//! Broadcast-backed event feed.

use super::types::LifecycleEvent;
use tokio::sync::broadcast;
use tracing::warn;

/// Events a slow consumer may fall behind by before it starts missing them.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Producer side, owned by the coordinator.
///
/// Emitting never blocks and does not care whether anyone listens.
#[derive(Debug)]
pub struct EventFeed {
    sender: Option<broadcast::Sender<LifecycleEvent>>,
}

impl EventFeed {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_BUFFER)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Some(sender),
        }
    }

    pub fn emit(&self, event: LifecycleEvent) {
        if let Some(sender) = &self.sender {
            // No receivers is fine.
            let _ = sender.send(event);
        }
    }

    /// A new consumer sees every event emitted from now on.
    ///
    /// After [`close`](Self::close) the returned stream is already ended.
    pub fn subscribe(&self) -> EventStream {
        let receiver = match &self.sender {
            Some(sender) => sender.subscribe(),
            None => {
                let (sender, receiver) = broadcast::channel(1);
                drop(sender);
                receiver
            }
        };
        EventStream { receiver }
    }

    /// Drop the sender. Consumers drain what is buffered and then end.
    pub fn close(&mut self) {
        self.sender = None;
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_none()
    }
}

impl Default for EventFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumer side of the feed.
#[derive(Debug)]
pub struct EventStream {
    receiver: broadcast::Receiver<LifecycleEvent>,
}

impl EventStream {
    /// Next event in emission order, or `None` once the feed is closed and
    /// drained.
    pub async fn next(&mut self) -> Option<LifecycleEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Event consumer lagged behind, skipping ahead");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-waiting variant of [`next`](Self::next). `None` means nothing is
    /// buffered right now or the feed is closed.
    pub fn try_next(&mut self) -> Option<LifecycleEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    warn!(missed, "Event consumer lagged behind, skipping ahead");
                }
                Err(_) => return None,
            }
        }
    }

    /// Everything currently buffered, in order.
    pub fn drain(&mut self) -> Vec<LifecycleEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}
