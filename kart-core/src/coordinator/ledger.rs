//! Where finished races go.

use async_trait::async_trait;
use thiserror::Error;

use crate::payout::RaceOutcome;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("amount out of range: {0}")]
    OutOfRange(String),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Long-term store for race outcomes.
///
/// Called once per race after the coordinator has released its lock. A
/// failure is reported as a warning event and never undoes the outcome.
#[async_trait]
pub trait LedgerSink: Send + Sync {
    async fn record(&self, outcome: &RaceOutcome) -> Result<(), PersistenceError>;
}

/// Ledger that keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLedger;

#[async_trait]
impl LedgerSink for NoopLedger {
    async fn record(&self, _outcome: &RaceOutcome) -> Result<(), PersistenceError> {
        Ok(())
    }
}
