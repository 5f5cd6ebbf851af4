//! Postgres-backed records: players, the persistent queue and the race
//! ledger.
//!
//! Each query is a request object executed through
//! [`DatabaseProcessor`](crate::framework::DatabaseProcessor).

pub mod players;
pub mod queue;
pub mod race_history;

/// Lifecycle of a row in `queue_entries`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "queue_status")]
pub enum QueueStatus {
    /// Waiting on the grid.
    Queued,
    /// In the race that is running now.
    Racing,
    /// Raced and paid out.
    Finished,
    /// Dropped for missing a ready check.
    Withdrawn,
}

impl QueueStatus {
    /// Still holds a spot, so a second join is refused.
    pub fn is_active(self) -> bool {
        matches!(self, QueueStatus::Queued | QueueStatus::Racing)
    }
}

pub(crate) fn cents_to_db(cents: u64) -> Result<i64, crate::coordinator::PersistenceError> {
    i64::try_from(cents)
        .map_err(|_| crate::coordinator::PersistenceError::OutOfRange(format!("{cents} cents")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_statuses() {
        assert!(QueueStatus::Queued.is_active());
        assert!(QueueStatus::Racing.is_active());
        assert!(!QueueStatus::Finished.is_active());
        assert!(!QueueStatus::Withdrawn.is_active());
    }

    #[test]
    fn test_cents_conversion_rejects_overflow() {
        assert_eq!(cents_to_db(1250).unwrap(), 1250);
        assert!(cents_to_db(u64::MAX).is_err());
    }
}
