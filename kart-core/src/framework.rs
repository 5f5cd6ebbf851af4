use sqlx::PgPool;

/// Executes kanau request objects against the connection pool.
#[derive(Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}
