//! Durable job queue.
//!
//! Claiming is a single `UPDATE ... RETURNING` statement, so two workers
//! (or two processes sharing the database file) never claim the same queued
//! job. An active job does go back to the queue when
//! [`JobQueue::recover_stalled`] runs with a cutoff after its start; worker
//! pools pass their job timeout so live claims elsewhere survive a restart.

use crate::error::{DatabaseError, Result};
use crate::timestamp;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eventide_core::JobId;
use eventide_scheduler::{
    EnqueueRequest, JobKind, JobListQuery, JobPage, JobPayload, JobPriority, JobQueue, JobRecord,
    JobStatus, QueueCounts, SchedulerError,
};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Pool, Row, Sqlite};

const JOB_COLUMNS: &str = "id, payload, priority, status, attempts, progress, available_at, \
     created_at, started_at, completed_at, updated_at, last_error, result";

type QueueResult<T> = std::result::Result<T, SchedulerError>;

/// Job queue backed by the `jobs` table.
#[derive(Debug, Clone)]
pub struct SqliteJobQueue {
    pool: Pool<Sqlite>,
}

impl SqliteJobQueue {
    /// Wrap an existing pool.
    #[must_use]
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    async fn insert(&self, record: &JobRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO jobs (id, kind, payload, priority, status, attempts, progress,
                available_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.as_str())
        .bind(record.kind().as_str())
        .bind(serde_json::to_string(&record.payload)?)
        .bind(record.priority.as_i64())
        .bind(record.status.as_str())
        .bind(i64::from(record.attempts))
        .bind(i64::from(record.progress))
        .bind(timestamp::encode(&record.available_at))
        .bind(timestamp::encode(&record.created_at))
        .bind(timestamp::encode(&record.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn claim(&self) -> Result<Option<JobRecord>> {
        let now = timestamp::encode(&Utc::now());

        let row = sqlx::query(&format!(
            "UPDATE jobs
             SET status = 'active', attempts = attempts + 1, started_at = ?1, updated_at = ?1
             WHERE status = 'queued' AND id = (
                 SELECT id FROM jobs
                 WHERE status = 'queued' AND available_at <= ?1
                 ORDER BY priority DESC, available_at, created_at, rowid
                 LIMIT 1
             )
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(&now)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(job_from_row).transpose()
    }

    async fn fetch(&self, id: &JobId) -> Result<Option<JobRecord>> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(job_from_row).transpose()
    }

    /// Explain why a transition guarded on `expected` touched no rows.
    async fn transition_error(&self, id: &JobId, expected: JobStatus) -> SchedulerError {
        match self.fetch(id).await {
            Ok(Some(job)) => SchedulerError::InvalidState {
                job_id: id.to_string(),
                status: job.status.to_string(),
                expected: expected.to_string(),
            },
            Ok(None) => SchedulerError::NotFound {
                job_id: id.to_string(),
            },
            Err(e) => e.into(),
        }
    }

    /// Run an `UPDATE` that only applies to an active job.
    async fn update_active<'q>(
        &self,
        id: &JobId,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> QueueResult<()> {
        let result = query
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from)?;
        if result.rows_affected() == 0 {
            return Err(self.transition_error(id, JobStatus::Active).await);
        }
        Ok(())
    }

    async fn page(&self, query: JobListQuery) -> Result<JobPage> {
        let status = query.status.map(JobStatus::as_str);

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE (?1 IS NULL OR status = ?1)")
                .bind(status)
                .fetch_one(&self.pool)
                .await?;

        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs
             WHERE (?1 IS NULL OR status = ?1)
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2 OFFSET ?3"
        ))
        .bind(status)
        .bind(i64::from(query.per_page))
        .bind(i64::try_from(query.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(JobPage {
            jobs: rows.iter().map(job_from_row).collect::<Result<_>>()?,
            total: u64::try_from(total).unwrap_or(0),
            page: query.page.max(1),
            per_page: query.per_page,
        })
    }

    /// Number of jobs in each state.
    pub async fn status_counts(&self) -> Result<QueueCounts> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM jobs GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let mut counts = QueueCounts::default();
        for (status, count) in rows {
            let count = u64::try_from(count).unwrap_or(0);
            match JobStatus::parse(&status) {
                Some(JobStatus::Queued) => counts.queued = count,
                Some(JobStatus::Active) => counts.active = count,
                Some(JobStatus::Completed) => counts.completed = count,
                Some(JobStatus::Failed) => counts.failed = count,
                None => tracing::warn!(status = %status, "unknown job status in queue"),
            }
        }
        Ok(counts)
    }

    /// Number of jobs that failed permanently at or after `since`.
    pub async fn failed_since(&self, since: DateTime<Utc>) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM jobs WHERE status = 'failed' AND completed_at >= ?",
        )
        .bind(timestamp::encode(&since))
        .fetch_one(&self.pool)
        .await?;

        Ok(u64::try_from(count).unwrap_or(0))
    }
}

fn job_from_row(row: &SqliteRow) -> Result<JobRecord> {
    let id: String = row.try_get("id")?;

    let payload: String = row.try_get("payload")?;
    let payload: JobPayload = serde_json::from_str(&payload)?;

    let priority: i64 = row.try_get("priority")?;
    let priority = JobPriority::from_i64(priority)
        .ok_or_else(|| DatabaseError::Decode(format!("invalid priority {priority} for job {id}")))?;

    let status: String = row.try_get("status")?;
    let status = JobStatus::parse(&status)
        .ok_or_else(|| DatabaseError::Decode(format!("invalid status '{status}' for job {id}")))?;

    let attempts: i64 = row.try_get("attempts")?;
    let progress: i64 = row.try_get("progress")?;
    let available_at: String = row.try_get("available_at")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    let result: Option<String> = row.try_get("result")?;

    Ok(JobRecord {
        id: JobId::from_string(id),
        payload,
        priority,
        status,
        attempts: u32::try_from(attempts).unwrap_or(0),
        progress: u8::try_from(progress.clamp(0, 100)).unwrap_or(0),
        available_at: timestamp::decode(&available_at)?,
        created_at: timestamp::decode(&created_at)?,
        started_at: timestamp::decode_opt(row.try_get("started_at")?)?,
        completed_at: timestamp::decode_opt(row.try_get("completed_at")?)?,
        updated_at: timestamp::decode(&updated_at)?,
        last_error: row.try_get("last_error")?,
        result: result.as_deref().map(serde_json::from_str).transpose()?,
    })
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn enqueue(&self, request: EnqueueRequest) -> QueueResult<JobRecord> {
        let record = JobRecord::from_request(request);
        self.insert(&record).await?;
        tracing::debug!(job_id = %record.id, kind = %record.kind(), "job enqueued");
        Ok(record)
    }

    async fn dequeue(&self) -> QueueResult<Option<JobRecord>> {
        Ok(self.claim().await?)
    }

    async fn complete(&self, id: &JobId, result: Option<serde_json::Value>) -> QueueResult<()> {
        let now = timestamp::encode(&Utc::now());
        let result = result.as_ref().map(serde_json::to_string).transpose()?;

        self.update_active(
            id,
            sqlx::query(
                "UPDATE jobs SET status = 'completed', progress = 100, completed_at = ?1,
                    updated_at = ?1, result = ?2
                 WHERE id = ?3 AND status = 'active'",
            )
            .bind(now)
            .bind(result)
            .bind(id.as_str()),
        )
        .await
    }

    async fn retry_later(
        &self,
        id: &JobId,
        available_at: DateTime<Utc>,
        error: &str,
    ) -> QueueResult<()> {
        self.update_active(
            id,
            sqlx::query(
                "UPDATE jobs SET status = 'queued', available_at = ?, last_error = ?, updated_at = ?
                 WHERE id = ? AND status = 'active'",
            )
            .bind(timestamp::encode(&available_at))
            .bind(error.to_string())
            .bind(timestamp::encode(&Utc::now()))
            .bind(id.as_str()),
        )
        .await
    }

    async fn defer(
        &self,
        id: &JobId,
        available_at: DateTime<Utc>,
        reason: &str,
    ) -> QueueResult<()> {
        self.update_active(
            id,
            sqlx::query(
                "UPDATE jobs SET status = 'queued', attempts = MAX(attempts - 1, 0),
                    available_at = ?, last_error = ?, updated_at = ?
                 WHERE id = ? AND status = 'active'",
            )
            .bind(timestamp::encode(&available_at))
            .bind(reason.to_string())
            .bind(timestamp::encode(&Utc::now()))
            .bind(id.as_str()),
        )
        .await
    }

    async fn fail(&self, id: &JobId, error: &str) -> QueueResult<()> {
        let now = timestamp::encode(&Utc::now());

        self.update_active(
            id,
            sqlx::query(
                "UPDATE jobs SET status = 'failed', completed_at = ?1, updated_at = ?1, last_error = ?2
                 WHERE id = ?3 AND status = 'active'",
            )
            .bind(now)
            .bind(error.to_string())
            .bind(id.as_str()),
        )
        .await
    }

    async fn set_progress(&self, id: &JobId, progress: u8) -> QueueResult<()> {
        self.update_active(
            id,
            sqlx::query(
                "UPDATE jobs SET progress = ?, updated_at = ? WHERE id = ? AND status = 'active'",
            )
            .bind(i64::from(progress.min(100)))
            .bind(timestamp::encode(&Utc::now()))
            .bind(id.as_str()),
        )
        .await
    }

    async fn get(&self, id: &JobId) -> QueueResult<Option<JobRecord>> {
        Ok(self.fetch(id).await?)
    }

    async fn list(&self, query: JobListQuery) -> QueueResult<JobPage> {
        Ok(self.page(query).await?)
    }

    async fn retry(&self, id: &JobId) -> QueueResult<JobRecord> {
        let now = timestamp::encode(&Utc::now());

        let row = sqlx::query(&format!(
            "UPDATE jobs SET status = 'queued', attempts = 0, progress = 0, available_at = ?1,
                completed_at = NULL, last_error = NULL, updated_at = ?1
             WHERE id = ?2 AND status = 'failed'
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(now)
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        match row {
            Some(row) => Ok(job_from_row(&row)?),
            None => Err(self.transition_error(id, JobStatus::Failed).await),
        }
    }

    async fn recover_stalled(&self, started_before: DateTime<Utc>) -> QueueResult<u64> {
        let now = timestamp::encode(&Utc::now());

        let result = sqlx::query(
            "UPDATE jobs SET status = 'queued', available_at = ?1, updated_at = ?1
             WHERE status = 'active' AND (started_at IS NULL OR started_at < ?2)",
        )
        .bind(now)
        .bind(timestamp::encode(&started_before))
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        Ok(result.rows_affected())
    }

    async fn queue_depth(&self, kind: JobKind) -> QueueResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM jobs WHERE kind = ? AND status IN ('queued', 'active')",
        )
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn counts(&self) -> QueueResult<QueueCounts> {
        Ok(self.status_counts().await?)
    }
}
