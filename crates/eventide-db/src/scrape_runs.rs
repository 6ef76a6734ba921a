//! Per-source scrape run records.
//!
//! One row is written for every source a scrape job touched, whether it
//! succeeded, short-circuited on a fresh page, or failed.

use crate::error::{DatabaseError, Result};
use crate::timestamp;
use chrono::{DateTime, Utc};
use eventide_core::{JobId, SourceId};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};

/// How a scrape run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Extraction ran and results were persisted
    Success,
    /// The listing page was unchanged since the last run
    NotModified,
    /// Extraction or persistence failed
    Failed,
}

impl RunStatus {
    /// Stored name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NotModified => "not_modified",
            Self::Failed => "failed",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(Self::Success),
            "not_modified" => Some(Self::NotModified),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A recorded scrape of one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeRun {
    /// Unique identifier for this run
    pub id: String,
    /// Source that was scraped
    pub source_id: SourceId,
    /// Job that triggered the run, if any
    pub job_id: Option<JobId>,
    /// Outcome
    pub status: RunStatus,
    /// Strategy that produced the events
    pub strategy: Option<String>,
    /// Records extracted
    pub events_found: u32,
    /// New events stored
    pub events_created: u32,
    /// Existing events merged
    pub events_updated: u32,
    /// Exact duplicates dropped
    pub events_skipped: u32,
    /// Wall-clock time of the run
    pub duration_ms: u64,
    /// Failure reason
    pub error_message: Option<String>,
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Run end
    pub finished_at: DateTime<Utc>,
}

impl ScrapeRun {
    /// A run record with a fresh id and zero counts.
    #[must_use]
    pub fn new(source_id: SourceId, status: RunStatus, started_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_id,
            job_id: None,
            status,
            strategy: None,
            events_found: 0,
            events_created: 0,
            events_updated: 0,
            events_skipped: 0,
            duration_ms: 0,
            error_message: None,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Persist a run record.
pub async fn record_run(pool: &Pool<Sqlite>, run: &ScrapeRun) -> Result<()> {
    sqlx::query(
        "INSERT INTO scrape_runs (id, source_id, job_id, status, strategy, events_found,
            events_created, events_updated, events_skipped, duration_ms, error_message,
            started_at, finished_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&run.id)
    .bind(run.source_id.as_str())
    .bind(run.job_id.as_ref().map(JobId::as_str))
    .bind(run.status.as_str())
    .bind(&run.strategy)
    .bind(i64::from(run.events_found))
    .bind(i64::from(run.events_created))
    .bind(i64::from(run.events_updated))
    .bind(i64::from(run.events_skipped))
    .bind(i64::try_from(run.duration_ms).unwrap_or(i64::MAX))
    .bind(&run.error_message)
    .bind(timestamp::encode(&run.started_at))
    .bind(timestamp::encode(&run.finished_at))
    .execute(pool)
    .await?;

    Ok(())
}

/// Most recent runs, newest first, optionally for one source.
pub async fn recent_runs(
    pool: &Pool<Sqlite>,
    source_id: Option<&SourceId>,
    limit: u32,
) -> Result<Vec<ScrapeRun>> {
    let rows = sqlx::query(
        "SELECT id, source_id, job_id, status, strategy, events_found, events_created,
                events_updated, events_skipped, duration_ms, error_message, started_at, finished_at
         FROM scrape_runs
         WHERE (?1 IS NULL OR source_id = ?1)
         ORDER BY finished_at DESC, rowid DESC
         LIMIT ?2",
    )
    .bind(source_id.map(SourceId::as_str))
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    rows.iter().map(run_from_row).collect()
}

fn count(row: &SqliteRow, column: &str) -> Result<u32> {
    let value: i64 = row.try_get(column)?;
    Ok(u32::try_from(value).unwrap_or(0))
}

fn run_from_row(row: &SqliteRow) -> Result<ScrapeRun> {
    let source_id: String = row.try_get("source_id")?;
    let status: String = row.try_get("status")?;
    let duration_ms: i64 = row.try_get("duration_ms")?;
    let job_id: Option<String> = row.try_get("job_id")?;
    let started_at: String = row.try_get("started_at")?;
    let finished_at: String = row.try_get("finished_at")?;

    Ok(ScrapeRun {
        id: row.try_get("id")?,
        source_id: SourceId::new(source_id).map_err(|e| DatabaseError::Decode(e.to_string()))?,
        job_id: job_id.map(JobId::from_string),
        status: RunStatus::parse(&status)
            .ok_or_else(|| DatabaseError::Decode(format!("invalid run status '{status}'")))?,
        strategy: row.try_get("strategy")?,
        events_found: count(row, "events_found")?,
        events_created: count(row, "events_created")?,
        events_updated: count(row, "events_updated")?,
        events_skipped: count(row, "events_skipped")?,
        duration_ms: u64::try_from(duration_ms).unwrap_or(0),
        error_message: row.try_get("error_message")?,
        started_at: timestamp::decode(&started_at)?,
        finished_at: timestamp::decode(&finished_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    #[tokio::test]
    async fn test_record_and_list_runs() {
        let db = Database::in_memory().await.expect("open database");
        db.run_migrations().await.expect("run migrations");

        let arts = SourceId::new("city-arts").expect("valid id");
        let market = SourceId::new("market-hall").expect("valid id");

        let mut run = ScrapeRun::new(arts.clone(), RunStatus::Success, Utc::now());
        run.strategy = Some("static-html".to_string());
        run.events_found = 5;
        run.events_created = 3;
        run.events_updated = 1;
        run.events_skipped = 1;
        run.job_id = Some(JobId::from_string("job-1"));
        record_run(db.pool(), &run).await.expect("record run");

        let mut failed = ScrapeRun::new(market, RunStatus::Failed, Utc::now());
        failed.error_message = Some("all strategies failed".to_string());
        record_run(db.pool(), &failed).await.expect("record run");

        let all = recent_runs(db.pool(), None, 10).await.expect("list runs");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].status, RunStatus::Failed);

        let only_arts = recent_runs(db.pool(), Some(&arts), 10)
            .await
            .expect("list runs");
        assert_eq!(only_arts.len(), 1);
        assert_eq!(only_arts[0].events_found, 5);
        assert_eq!(only_arts[0].job_id, Some(JobId::from_string("job-1")));
    }
}
