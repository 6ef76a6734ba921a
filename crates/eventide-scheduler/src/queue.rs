//! Queue backend abstraction and an in-process implementation.

use crate::error::{Result, SchedulerError};
use crate::jobs::{
    EnqueueRequest, JobKind, JobListQuery, JobPage, JobRecord, JobStatus, QueueCounts,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eventide_core::JobId;
use std::sync::Mutex;

/// Durable job storage and claiming, consumed by the worker pool and the
/// admin surface.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Add a job.
    async fn enqueue(&self, request: EnqueueRequest) -> Result<JobRecord>;

    /// Claim the next due job: highest priority first, then earliest
    /// `available_at`, then oldest. The claimed job becomes `Active` with its
    /// attempt count incremented.
    async fn dequeue(&self) -> Result<Option<JobRecord>>;

    /// Mark an active job completed.
    async fn complete(&self, id: &JobId, result: Option<serde_json::Value>) -> Result<()>;

    /// Return an active job to the queue after a failed attempt.
    async fn retry_later(&self, id: &JobId, available_at: DateTime<Utc>, error: &str) -> Result<()>;

    /// Return an active job to the queue without consuming the attempt
    /// (used when the target asked us to slow down).
    async fn defer(&self, id: &JobId, available_at: DateTime<Utc>, reason: &str) -> Result<()>;

    /// Park a job as permanently failed.
    async fn fail(&self, id: &JobId, error: &str) -> Result<()>;

    /// Record handler progress (0-100).
    async fn set_progress(&self, id: &JobId, progress: u8) -> Result<()>;

    /// Look up one job.
    async fn get(&self, id: &JobId) -> Result<Option<JobRecord>>;

    /// Page through jobs, newest first.
    async fn list(&self, query: JobListQuery) -> Result<JobPage>;

    /// Requeue a failed job with a fresh attempt budget.
    async fn retry(&self, id: &JobId) -> Result<JobRecord>;

    /// Requeue active jobs whose attempt started before `started_before`.
    /// Returns the number of jobs recovered.
    async fn recover_stalled(&self, started_before: DateTime<Utc>) -> Result<u64>;

    /// Queued plus active jobs of `kind`.
    async fn queue_depth(&self, kind: JobKind) -> Result<u64>;

    /// Jobs per state.
    async fn counts(&self) -> Result<QueueCounts>;
}

fn clamp_progress(progress: u8) -> u8 {
    progress.min(100)
}

/// Non-durable queue for tests and single-shot runs.
#[derive(Debug, Default)]
pub struct MemoryJobQueue {
    jobs: Mutex<Vec<JobRecord>>,
}

impl MemoryJobQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_active<F>(&self, id: &JobId, apply: F) -> Result<()>
    where
        F: FnOnce(&mut JobRecord),
    {
        let mut jobs = self.jobs.lock().expect("acquire job queue lock");
        let job = jobs
            .iter_mut()
            .find(|j| &j.id == id)
            .ok_or_else(|| SchedulerError::NotFound {
                job_id: id.to_string(),
            })?;

        if job.status != JobStatus::Active {
            return Err(SchedulerError::InvalidState {
                job_id: id.to_string(),
                status: job.status.to_string(),
                expected: JobStatus::Active.to_string(),
            });
        }

        apply(job);
        job.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, request: EnqueueRequest) -> Result<JobRecord> {
        let record = JobRecord::from_request(request);
        self.jobs
            .lock()
            .expect("acquire job queue lock")
            .push(record.clone());
        Ok(record)
    }

    async fn dequeue(&self) -> Result<Option<JobRecord>> {
        let now = Utc::now();
        let mut jobs = self.jobs.lock().expect("acquire job queue lock");

        // Vec order is insertion order, so `min_by_key` keeps the oldest on ties.
        let next = jobs
            .iter_mut()
            .filter(|j| j.status == JobStatus::Queued && j.available_at <= now)
            .min_by_key(|j| (std::cmp::Reverse(j.priority), j.available_at, j.created_at));

        Ok(next.map(|job| {
            job.status = JobStatus::Active;
            job.attempts += 1;
            job.started_at = Some(now);
            job.updated_at = now;
            job.clone()
        }))
    }

    async fn complete(&self, id: &JobId, result: Option<serde_json::Value>) -> Result<()> {
        self.with_active(id, |job| {
            job.status = JobStatus::Completed;
            job.progress = 100;
            job.completed_at = Some(Utc::now());
            job.result = result;
        })
    }

    async fn retry_later(&self, id: &JobId, available_at: DateTime<Utc>, error: &str) -> Result<()> {
        self.with_active(id, |job| {
            job.status = JobStatus::Queued;
            job.available_at = available_at;
            job.last_error = Some(error.to_string());
        })
    }

    async fn defer(&self, id: &JobId, available_at: DateTime<Utc>, reason: &str) -> Result<()> {
        self.with_active(id, |job| {
            job.status = JobStatus::Queued;
            job.attempts = job.attempts.saturating_sub(1);
            job.available_at = available_at;
            job.last_error = Some(reason.to_string());
        })
    }

    async fn fail(&self, id: &JobId, error: &str) -> Result<()> {
        self.with_active(id, |job| {
            job.status = JobStatus::Failed;
            job.completed_at = Some(Utc::now());
            job.last_error = Some(error.to_string());
        })
    }

    async fn set_progress(&self, id: &JobId, progress: u8) -> Result<()> {
        self.with_active(id, |job| job.progress = clamp_progress(progress))
    }

    async fn get(&self, id: &JobId) -> Result<Option<JobRecord>> {
        let jobs = self.jobs.lock().expect("acquire job queue lock");
        Ok(jobs.iter().find(|j| &j.id == id).cloned())
    }

    async fn list(&self, query: JobListQuery) -> Result<JobPage> {
        let jobs = self.jobs.lock().expect("acquire job queue lock");

        let matching: Vec<&JobRecord> = jobs
            .iter()
            .rev()
            .filter(|j| query.status.map_or(true, |s| j.status == s))
            .collect();

        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let page = matching
            .iter()
            .skip(offset)
            .take(query.per_page as usize)
            .map(|j| (*j).clone())
            .collect();

        Ok(JobPage {
            jobs: page,
            total: matching.len() as u64,
            page: query.page.max(1),
            per_page: query.per_page,
        })
    }

    async fn retry(&self, id: &JobId) -> Result<JobRecord> {
        let mut jobs = self.jobs.lock().expect("acquire job queue lock");
        let job = jobs
            .iter_mut()
            .find(|j| &j.id == id)
            .ok_or_else(|| SchedulerError::NotFound {
                job_id: id.to_string(),
            })?;

        if job.status != JobStatus::Failed {
            return Err(SchedulerError::InvalidState {
                job_id: id.to_string(),
                status: job.status.to_string(),
                expected: JobStatus::Failed.to_string(),
            });
        }

        let now = Utc::now();
        job.status = JobStatus::Queued;
        job.attempts = 0;
        job.progress = 0;
        job.available_at = now;
        job.completed_at = None;
        job.last_error = None;
        job.updated_at = now;
        Ok(job.clone())
    }

    async fn recover_stalled(&self, started_before: DateTime<Utc>) -> Result<u64> {
        let mut jobs = self.jobs.lock().expect("acquire job queue lock");
        let now = Utc::now();
        let mut recovered = 0;

        for job in jobs.iter_mut().filter(|j| {
            j.status == JobStatus::Active && j.started_at.map_or(true, |s| s < started_before)
        }) {
            job.status = JobStatus::Queued;
            job.available_at = now;
            job.updated_at = now;
            recovered += 1;
        }

        Ok(recovered)
    }

    async fn queue_depth(&self, kind: JobKind) -> Result<u64> {
        let jobs = self.jobs.lock().expect("acquire job queue lock");
        Ok(jobs
            .iter()
            .filter(|j| j.kind() == kind && matches!(j.status, JobStatus::Queued | JobStatus::Active))
            .count() as u64)
    }

    async fn counts(&self) -> Result<QueueCounts> {
        let jobs = self.jobs.lock().expect("acquire job queue lock");
        let mut counts = QueueCounts::default();
        for job in jobs.iter() {
            match job.status {
                JobStatus::Queued => counts.queued += 1,
                JobStatus::Active => counts.active += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }
}
