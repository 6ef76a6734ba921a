//! Eventide database layer.
//!
//! Provides SQLite persistence via `SQLx`: the event store consumed by the
//! scrape orchestrator, the durable source and job stores, scrape run records
//! and rolling metrics. Migrations are embedded and applied at startup.
//!
//! # Example
//!
//! ```rust,no_run
//! use eventide_db::Database;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::in_memory().await?;
//! db.run_migrations().await?;
//!
//! let events = db.event_store();
//! let jobs = db.job_queue();
//! # let _ = (events, jobs);
//! db.close().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod connection;
pub mod error;
pub mod events;
pub mod jobs;
pub mod metrics;
pub mod migrations;
pub mod scrape_runs;
pub mod sources;
mod timestamp;

pub use connection::{ConnectOptions, MEMORY_PATH};
pub use error::{DatabaseError, Result};
pub use events::SqliteEventStore;
pub use jobs::SqliteJobQueue;
pub use metrics::RollingMetrics;
pub use scrape_runs::{RunStatus, ScrapeRun};
pub use sources::SqliteSourceStore;

use chrono::{DateTime, Utc};
use eventide_core::{DatabaseConfig, SourceId};
use sqlx::{Pool, Sqlite};
use std::path::Path;

/// Handle to the Eventide database.
///
/// Cloning is cheap; every clone shares the same connection pool. The
/// process opens one handle at startup and closes it on shutdown.
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open the database at `path`, retrying with backoff per `options`.
    pub async fn connect(path: impl AsRef<Path>, options: ConnectOptions) -> Result<Self> {
        let pool = connection::connect(path, options).await?;
        Ok(Self { pool })
    }

    /// Open the database described by `config`, using `default_path` when
    /// the config names none.
    pub async fn from_config(config: &DatabaseConfig, default_path: &Path) -> Result<Self> {
        let path = config.path.as_deref().unwrap_or(default_path);
        Self::connect(path, ConnectOptions::from(config)).await
    }

    /// Open a private in-memory database.
    pub async fn in_memory() -> Result<Self> {
        Self::connect(MEMORY_PATH, ConnectOptions::default()).await
    }

    /// Apply pending migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Number of applied migrations.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(&self.pool).await
    }

    /// Check the database answers a trivial query.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Underlying pool, for direct queries.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Event store over this database.
    #[must_use]
    pub fn event_store(&self) -> SqliteEventStore {
        SqliteEventStore::new(self.pool.clone())
    }

    /// Source store over this database.
    #[must_use]
    pub fn source_store(&self) -> SqliteSourceStore {
        SqliteSourceStore::new(self.pool.clone())
    }

    /// Job queue over this database.
    #[must_use]
    pub fn job_queue(&self) -> SqliteJobQueue {
        SqliteJobQueue::new(self.pool.clone())
    }

    /// Persist a scrape run record.
    pub async fn record_scrape_run(&self, run: &ScrapeRun) -> Result<()> {
        scrape_runs::record_run(&self.pool, run).await
    }

    /// Most recent scrape runs, newest first.
    pub async fn recent_scrape_runs(
        &self,
        source_id: Option<&SourceId>,
        limit: u32,
    ) -> Result<Vec<ScrapeRun>> {
        scrape_runs::recent_runs(&self.pool, source_id, limit).await
    }

    /// Rolling metrics as of `now`.
    pub async fn rolling_metrics(&self, now: DateTime<Utc>) -> Result<RollingMetrics> {
        metrics::rolling_metrics(&self.pool, now).await
    }

    /// Close the connection pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("database pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_migrations() {
        let db = Database::in_memory().await.expect("create database");

        assert_eq!(db.get_schema_version().await.expect("get version"), 0);
        db.run_migrations().await.expect("run migrations");
        assert_eq!(db.get_schema_version().await.expect("get version"), 3);

        db.ping().await.expect("ping");
    }

    #[tokio::test]
    async fn test_database_schema() {
        let db = Database::in_memory().await.expect("create database");
        db.run_migrations().await.expect("run migrations");

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name != '_sqlx_migrations' ORDER BY name"
        )
        .fetch_all(db.pool())
        .await
        .expect("query tables");

        assert_eq!(tables, vec!["events", "jobs", "scrape_runs", "sources"]);
    }

    #[tokio::test]
    async fn test_database_close() {
        let db = Database::in_memory().await.expect("create database");
        db.close().await;
        assert!(db.ping().await.is_err());
    }
}
