//! Rolling ingestion metrics.

use crate::error::Result;
use crate::jobs::SqliteJobQueue;
use crate::timestamp;
use chrono::{DateTime, Duration, Utc};
use eventide_scheduler::QueueCounts;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};

/// Snapshot of ingestion activity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RollingMetrics {
    /// Records extracted since midnight UTC
    pub events_scraped_today: u64,
    /// New events stored since midnight UTC
    pub events_created_today: u64,
    /// Share of today's scrape runs that failed (0 when there were none)
    pub error_rate_today: f64,
    /// Jobs that failed permanently in the last hour
    pub failed_jobs_last_hour: u64,
    /// Current queue depth by status
    pub queue: QueueCounts,
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map_or(now, |midnight| midnight.and_utc())
}

/// Compute metrics as of `now`.
pub async fn rolling_metrics(pool: &Pool<Sqlite>, now: DateTime<Utc>) -> Result<RollingMetrics> {
    let since = timestamp::encode(&start_of_day(now));

    let (runs, failed_runs, found, created): (i64, i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(events_found), 0),
                COALESCE(SUM(events_created), 0)
         FROM scrape_runs WHERE finished_at >= ?",
    )
    .bind(since)
    .fetch_one(pool)
    .await?;

    let queue = SqliteJobQueue::new(pool.clone());
    let failed_jobs_last_hour = queue.failed_since(now - Duration::hours(1)).await?;
    let counts = queue.status_counts().await?;

    #[allow(clippy::cast_precision_loss)]
    let error_rate_today = if runs > 0 {
        failed_runs as f64 / runs as f64
    } else {
        0.0
    };

    Ok(RollingMetrics {
        events_scraped_today: u64::try_from(found).unwrap_or(0),
        events_created_today: u64::try_from(created).unwrap_or(0),
        error_rate_today,
        failed_jobs_last_hour,
        queue: counts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape_runs::{record_run, RunStatus, ScrapeRun};
    use crate::Database;
    use eventide_core::SourceId;
    use eventide_scheduler::{EnqueueRequest, JobPayload, JobPriority, JobQueue};

    #[test]
    fn test_start_of_day() {
        let now = DateTime::parse_from_rfc3339("2026-03-09T17:45:12Z")
            .expect("valid time")
            .with_timezone(&Utc);
        assert_eq!(
            timestamp::encode(&start_of_day(now)),
            "2026-03-09T00:00:00.000000Z"
        );
    }

    #[tokio::test]
    async fn test_empty_database() {
        let db = Database::in_memory().await.expect("open database");
        db.run_migrations().await.expect("run migrations");

        let metrics = rolling_metrics(db.pool(), Utc::now()).await.expect("metrics");
        assert_eq!(metrics.events_scraped_today, 0);
        assert!(metrics.error_rate_today.abs() < f64::EPSILON);
        assert_eq!(metrics.queue, QueueCounts::default());
    }

    #[tokio::test]
    async fn test_metrics_aggregate_runs_and_jobs() {
        let db = Database::in_memory().await.expect("open database");
        db.run_migrations().await.expect("run migrations");
        let source = SourceId::new("city-arts").expect("valid id");

        let mut ok = ScrapeRun::new(source.clone(), RunStatus::Success, Utc::now());
        ok.events_found = 8;
        ok.events_created = 5;
        record_run(db.pool(), &ok).await.expect("record run");
        let failed = ScrapeRun::new(source, RunStatus::Failed, Utc::now());
        record_run(db.pool(), &failed).await.expect("record run");

        let queue = db.job_queue();
        queue
            .enqueue(EnqueueRequest::new(JobPayload::ScrapeAll, JobPriority::Normal))
            .await
            .expect("enqueue");

        let metrics = rolling_metrics(db.pool(), Utc::now()).await.expect("metrics");
        assert_eq!(metrics.events_scraped_today, 8);
        assert_eq!(metrics.events_created_today, 5);
        assert!((metrics.error_rate_today - 0.5).abs() < 1e-9);
        assert_eq!(metrics.queue.queued, 1);
        assert_eq!(metrics.failed_jobs_last_hour, 0);
    }
}
