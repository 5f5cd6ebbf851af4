use async_trait::async_trait;
use kanau::processor::Processor;
use sqlx::PgPool;
use tracing::info;

use super::cents_to_db;
use crate::coordinator::{LedgerSink, PersistenceError};
use crate::framework::DatabaseProcessor;
use crate::payout::{RaceOutcome, duration_ms};

#[derive(Debug, Clone)]
/// Write a finished race in one transaction:
///
/// 1. one `race_history` row
/// 2. one `race_results` row per racer
/// 3. each racer's `racer_ledger` row (lifetime earnings and race count)
pub struct RecordRaceOutcome {
    pub outcome: RaceOutcome,
}

impl Processor<RecordRaceOutcome> for DatabaseProcessor {
    type Output = ();
    type Error = PersistenceError;
    #[tracing::instrument(skip_all, err, name = "SQL:RecordRaceOutcome")]
    async fn process(&self, record: RecordRaceOutcome) -> Result<(), PersistenceError> {
        let RecordRaceOutcome { outcome } = record;
        let duration = i64::try_from(duration_ms(outcome.duration)).unwrap_or(i64::MAX);

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO race_history (race_id, finished_at, duration_ms, winner_id, total_pot)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(outcome.race_id)
        .bind(outcome.finished_at)
        .bind(duration)
        .bind(outcome.winner().map(|line| line.racer_id.to_string()))
        .bind(cents_to_db(outcome.total_pot.cents())?)
        .execute(&mut *tx)
        .await?;

        for line in &outcome.results {
            let payout = cents_to_db(line.payout.cents())?;
            let rank = i32::try_from(line.rank).unwrap_or(i32::MAX);

            sqlx::query(
                r#"
                INSERT INTO race_results (race_id, racer_id, rank, session_total, payout)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(outcome.race_id)
            .bind(line.racer_id.as_str())
            .bind(rank)
            .bind(cents_to_db(line.session_total.cents())?)
            .bind(payout)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO racer_ledger (racer_id, lifetime_earnings, races_run)
                VALUES ($1, $2, 1)
                ON CONFLICT (racer_id) DO UPDATE
                SET lifetime_earnings = racer_ledger.lifetime_earnings + EXCLUDED.lifetime_earnings,
                    races_run = racer_ledger.races_run + 1,
                    updated_at = now()
                "#,
            )
            .bind(line.racer_id.as_str())
            .bind(payout)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

/// [`LedgerSink`] backed by Postgres.
#[derive(Clone)]
pub struct PgLedger {
    processor: DatabaseProcessor,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self {
            processor: DatabaseProcessor { pool },
        }
    }
}

#[async_trait]
impl LedgerSink for PgLedger {
    async fn record(&self, outcome: &RaceOutcome) -> Result<(), PersistenceError> {
        self.processor
            .process(RecordRaceOutcome {
                outcome: outcome.clone(),
            })
            .await?;
        info!(
            race_id = %outcome.race_id,
            racers = outcome.results.len(),
            "Race outcome recorded"
        );
        Ok(())
    }
}
