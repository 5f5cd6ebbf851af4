//! Lifecycle event feed.
//!
//! The coordinator emits one [`LifecycleEvent`] per committed transition.
//! Any number of consumers can follow the feed:
//!
//! - `EventAnnouncer` turns events into structured log lines
//! - `QueueSync` mirrors roster changes into the persistent queue
//!
//! Events are ephemeral. A consumer that falls too far behind skips the
//! events it missed and carries on.

pub mod feed;
pub mod types;

pub use feed::{DEFAULT_CHANNEL_BUFFER, EventFeed, EventStream};
pub use types::{CancelReason, LifecycleEvent};
