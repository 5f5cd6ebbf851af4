use compact_str::CompactString;
use kanau::processor::Processor;

use crate::framework::DatabaseProcessor;

#[derive(Debug, Clone)]
/// Insert a player, or refresh the name and avatar of an existing one.
pub struct UpsertPlayer {
    pub racer_id: CompactString,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl Processor<UpsertPlayer> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpsertPlayer")]
    async fn process(&self, upsert: UpsertPlayer) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO players (racer_id, display_name, avatar_url)
            VALUES ($1, $2, $3)
            ON CONFLICT (racer_id) DO UPDATE
            SET display_name = EXCLUDED.display_name,
                avatar_url = EXCLUDED.avatar_url,
                updated_at = now()
            "#,
        )
        .bind(upsert.racer_id.as_str())
        .bind(upsert.display_name)
        .bind(upsert.avatar_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
