//! Schema migrations.
//!
//! The SQL files under `migrations/` are embedded at compile time and applied
//! in order; `SQLx` records each applied version in `_sqlx_migrations`.

use crate::error::{DatabaseError, Result};
use sqlx::{Pool, Sqlite};

/// Apply every embedded migration not yet recorded as applied.
pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<()> {
    let migrator = sqlx::migrate!("./migrations");
    tracing::debug!(available = migrator.iter().count(), "applying migrations");

    migrator
        .run(pool)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;

    tracing::info!("database schema up to date");
    Ok(())
}

/// Highest applied migration version, or 0 on a fresh database.
pub async fn get_schema_version(pool: &Pool<Sqlite>) -> Result<i64> {
    let tracked: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?;

    if tracked == 0 {
        return Ok(0);
    }

    let version: i64 =
        sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?;

    Ok(version)
}
