//! Job type definitions.

use chrono::{DateTime, Duration, Utc};
use eventide_core::{JobId, SourceId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Work a job performs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    /// Scrape one source
    ScrapeSource {
        /// Source to scrape
        source_id: SourceId,
    },
    /// Scrape every active source
    ScrapeAll,
    /// Report queue and source health
    HealthCheck,
    /// Fan out one scrape job per active source
    BulkSchedule {
        /// Delay the fan-out was scheduled with
        delay_minutes: u32,
    },
}

impl JobPayload {
    /// Kind of this payload.
    #[must_use]
    pub fn kind(&self) -> JobKind {
        match self {
            Self::ScrapeSource { .. } => JobKind::ScrapeSource,
            Self::ScrapeAll => JobKind::ScrapeAll,
            Self::HealthCheck => JobKind::HealthCheck,
            Self::BulkSchedule { .. } => JobKind::BulkSchedule,
        }
    }
}

/// Payload discriminant, stored alongside the payload for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// See [`JobPayload::ScrapeSource`]
    ScrapeSource,
    /// See [`JobPayload::ScrapeAll`]
    ScrapeAll,
    /// See [`JobPayload::HealthCheck`]
    HealthCheck,
    /// See [`JobPayload::BulkSchedule`]
    BulkSchedule,
}

impl JobKind {
    /// Stored name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ScrapeSource => "scrape_source",
            Self::ScrapeAll => "scrape_all",
            Self::HealthCheck => "health_check",
            Self::BulkSchedule => "bulk_schedule",
        }
    }

    /// Parse a stored name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "scrape_source" => Some(Self::ScrapeSource),
            "scrape_all" => Some(Self::ScrapeAll),
            "health_check" => Some(Self::HealthCheck),
            "bulk_schedule" => Some(Self::BulkSchedule),
            _ => None,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dispatch priority; higher runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPriority {
    /// Background maintenance
    Low = 0,
    /// Scheduler-originated batches
    Normal = 1,
    /// Manually triggered "scrape now"
    High = 2,
}

impl JobPriority {
    /// Stored integer value.
    #[must_use]
    pub fn as_i64(self) -> i64 {
        self as i64
    }

    /// Parse a stored integer value.
    #[must_use]
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Low),
            1 => Some(Self::Normal),
            2 => Some(Self::High),
            _ => None,
        }
    }
}

/// Job lifecycle state.
///
/// `Queued -> Active -> Completed`, or `Active -> Queued` again while retries
/// remain, or `Active -> Failed` once they are exhausted. `Failed` jobs stay
/// put until retried by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting for a worker (possibly delayed)
    Queued,
    /// Claimed by a worker
    Active,
    /// Finished successfully
    Completed,
    /// Retries exhausted or failed permanently
    Failed,
}

impl JobStatus {
    /// Stored name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse a stored name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "queued" => Some(Self::Queued),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether no worker will touch the job again on its own.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job as held by the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Unique job id
    pub id: JobId,
    /// Work to perform
    pub payload: JobPayload,
    /// Dispatch priority
    pub priority: JobPriority,
    /// Lifecycle state
    pub status: JobStatus,
    /// Attempts started so far
    pub attempts: u32,
    /// Progress percentage reported by the handler
    pub progress: u8,
    /// Earliest time a worker may claim the job
    pub available_at: DateTime<Utc>,
    /// Enqueue time
    pub created_at: DateTime<Utc>,
    /// Start of the latest attempt
    pub started_at: Option<DateTime<Utc>>,
    /// Completion or terminal failure time
    pub completed_at: Option<DateTime<Utc>>,
    /// Last state change
    pub updated_at: DateTime<Utc>,
    /// Most recent failure reason
    pub last_error: Option<String>,
    /// Handler output on success
    pub result: Option<serde_json::Value>,
}

impl JobRecord {
    /// A fresh queued record for `request`.
    #[must_use]
    pub fn from_request(request: EnqueueRequest) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::generate(),
            payload: request.payload,
            priority: request.priority,
            status: JobStatus::Queued,
            attempts: 0,
            progress: 0,
            available_at: request.available_at.unwrap_or(now),
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
            last_error: None,
            result: None,
        }
    }

    /// Job kind.
    #[must_use]
    pub fn kind(&self) -> JobKind {
        self.payload.kind()
    }
}

/// Request to add a job to the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnqueueRequest {
    /// Work to perform
    pub payload: JobPayload,
    /// Dispatch priority
    pub priority: JobPriority,
    /// Delay until this time; `None` means immediately
    pub available_at: Option<DateTime<Utc>>,
}

impl EnqueueRequest {
    /// Immediate job.
    #[must_use]
    pub fn new(payload: JobPayload, priority: JobPriority) -> Self {
        Self {
            payload,
            priority,
            available_at: None,
        }
    }

    /// Hold the job back by `delay`.
    #[must_use]
    pub fn delayed_by(mut self, delay: Duration) -> Self {
        self.available_at = Some(Utc::now() + delay);
        self
    }
}

/// Paginated job listing request. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobListQuery {
    /// Only jobs in this state
    pub status: Option<JobStatus>,
    /// Page number, starting at 1
    pub page: u32,
    /// Page size
    pub per_page: u32,
}

impl Default for JobListQuery {
    fn default() -> Self {
        Self {
            status: None,
            page: 1,
            per_page: 20,
        }
    }
}

impl JobListQuery {
    /// Rows to skip.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.per_page)
    }
}

/// One page of jobs, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPage {
    /// Jobs on this page
    pub jobs: Vec<JobRecord>,
    /// Jobs matching the filter across all pages
    pub total: u64,
    /// Page number
    pub page: u32,
    /// Page size
    pub per_page: u32,
}

/// Number of jobs in each state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    /// Waiting jobs (including delayed ones)
    pub queued: u64,
    /// Running jobs
    pub active: u64,
    /// Finished jobs
    pub completed: u64,
    /// Parked failed jobs
    pub failed: u64,
}
