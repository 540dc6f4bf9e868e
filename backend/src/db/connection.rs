use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

pub type DbPool = PgPool;

/// Connects with a bounded acquire timeout so a slow or unreachable
/// database fails requests instead of wedging them.
pub async fn create_pool(
    database_url: &str,
    acquire_timeout_seconds: u64,
) -> anyhow::Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(acquire_timeout_seconds))
        .connect(database_url)
        .await?;
    Ok(pool)
}
