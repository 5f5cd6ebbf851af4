use compact_str::CompactString;
use kanau::processor::Processor;

use super::QueueStatus;
use crate::framework::DatabaseProcessor;

/// A queued racer joined with their player record.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct GridEntry {
    pub entry_id: i64,
    pub racer_id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub status: QueueStatus,
    pub created_at: time::OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueInsert {
    Inserted { entry_id: i64 },
    /// The racer already holds a queued or racing entry.
    AlreadyQueued,
}

#[derive(Debug, Clone)]
/// Add a queue entry for an existing player.
///
/// Relies on the partial unique index over active entries, so a duplicate
/// is reported as [`QueueInsert::AlreadyQueued`] instead of an error.
pub struct EnqueuePlayer {
    pub racer_id: CompactString,
}

impl Processor<EnqueuePlayer> for DatabaseProcessor {
    type Output = QueueInsert;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:EnqueuePlayer")]
    async fn process(&self, insert: EnqueuePlayer) -> Result<QueueInsert, sqlx::Error> {
        let entry_id: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO queue_entries (racer_id, status)
            VALUES ($1, 'queued')
            ON CONFLICT (racer_id) WHERE status IN ('queued', 'racing') DO NOTHING
            RETURNING id
            "#,
        )
        .bind(insert.racer_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(match entry_id {
            Some(entry_id) => QueueInsert::Inserted { entry_id },
            None => QueueInsert::AlreadyQueued,
        })
    }
}

#[derive(Debug, Clone)]
/// Queued entries in join order, oldest first.
pub struct GetActiveGrid {
    pub limit: i64,
}

impl Processor<GetActiveGrid> for DatabaseProcessor {
    type Output = Vec<GridEntry>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetActiveGrid")]
    async fn process(&self, query: GetActiveGrid) -> Result<Vec<GridEntry>, sqlx::Error> {
        sqlx::query_as::<_, GridEntry>(
            r#"
            SELECT
                q.id AS entry_id,
                q.racer_id,
                p.display_name,
                p.avatar_url,
                q.status,
                q.created_at
            FROM queue_entries q
            JOIN players p ON p.racer_id = q.racer_id
            WHERE q.status = 'queued'
            ORDER BY q.created_at ASC, q.id ASC
            LIMIT $1
            "#,
        )
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Move the active entries of the given racers to `to`.
pub struct UpdateQueueStatus {
    pub racer_ids: Vec<CompactString>,
    pub to: QueueStatus,
}

impl Processor<UpdateQueueStatus> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpdateQueueStatus")]
    async fn process(&self, update: UpdateQueueStatus) -> Result<u64, sqlx::Error> {
        if update.racer_ids.is_empty() {
            return Ok(0);
        }
        let racer_ids: Vec<String> = update.racer_ids.iter().map(|id| id.to_string()).collect();
        let result = sqlx::query(
            r#"
            UPDATE queue_entries
            SET status = $2, updated_at = now()
            WHERE racer_id = ANY($1) AND status IN ('queued', 'racing')
            "#,
        )
        .bind(racer_ids)
        .bind(update.to)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
/// Close out every entry that was racing.
pub struct FinishRacingEntries;

impl Processor<FinishRacingEntries> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:FinishRacingEntries")]
    async fn process(&self, _: FinishRacingEntries) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE queue_entries
            SET status = 'finished', updated_at = now()
            WHERE status = 'racing'
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
/// Put entries stranded in `racing` by a restart back in the queue.
///
/// Races live in memory, so after a restart nobody is actually racing.
pub struct RequeueInterrupted;

impl Processor<RequeueInterrupted> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:RequeueInterrupted")]
    async fn process(&self, _: RequeueInterrupted) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE queue_entries
            SET status = 'queued', updated_at = now()
            WHERE status = 'racing'
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
