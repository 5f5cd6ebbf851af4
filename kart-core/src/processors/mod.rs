//! Background consumers of the lifecycle event feed.
//!
//! - `EventAnnouncer`: turns every event into a structured log line
//! - `QueueSync`: mirrors roster transitions into `queue_entries`
//!
//! Both run until shutdown is signalled or the feed is closed, and both
//! finish whatever is already buffered before they stop.

pub mod announcer;
pub mod queue_sync;

pub use announcer::EventAnnouncer;
pub use queue_sync::{QueueSync, QueueSyncAction};
