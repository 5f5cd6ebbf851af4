use kart_sdk::StateSnapshot;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("subscriber is gone")]
    Closed,
    #[error("subscriber is not keeping up")]
    Backpressure,
}

/// One viewer connection, as seen by the hub.
///
/// `deliver` must not block. Any error means the subscriber is dropped.
pub trait SnapshotSink: Send + Sync {
    fn deliver(&self, snapshot: Arc<StateSnapshot>) -> Result<(), DeliveryError>;
}

/// Sink backed by a bounded channel. The connection task owns the receiver
/// and writes frames to the socket at its own pace.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<Arc<StateSnapshot>>,
}

impl SnapshotSink for ChannelSink {
    fn deliver(&self, snapshot: Arc<StateSnapshot>) -> Result<(), DeliveryError> {
        self.sender.try_send(snapshot).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Backpressure,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

pub fn channel_sink(buffer: usize) -> (ChannelSink, mpsc::Receiver<Arc<StateSnapshot>>) {
    let (sender, receiver) = mpsc::channel(buffer.max(1));
    (ChannelSink { sender }, receiver)
}
