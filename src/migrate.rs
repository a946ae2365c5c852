use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Tables this module owns in the feed database. The chunk table must not
/// be named after any of them.
pub const INTERNAL_TABLES: [&str; 2] = ["cache_entries", "access_log"];

/// Create the cache and access-log tables.
///
/// The chunk table is not created here: it first appears with a
/// successful ingest, so an un-ingested deployment reads as a missing
/// store rather than an empty one.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cache_entries (
            cache_key TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            expires_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS access_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            recorded_at TEXT NOT NULL,
            operation TEXT NOT NULL,
            outcome TEXT NOT NULL,
            detail TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config.require_db_path()?).await?;
    ensure_schema(&pool).await?;
    pool.close().await;
    Ok(())
}
