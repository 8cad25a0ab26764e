use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    create_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the object table on an open pool. Idempotent.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // Seen markers and the feed cursor share one key-value table;
    // the key prefix is the partition (`seen/{id}`, `cursor`).
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS objects (
            key TEXT PRIMARY KEY,
            value BLOB NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
