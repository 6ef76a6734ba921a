//! Eventide Scheduler - durable job dispatch for scrape work.
//!
//! - [`jobs`]: job payloads, priorities and lifecycle states
//! - [`queue`]: the [`JobQueue`] backend trait plus an in-process queue
//! - [`backoff`]: exponential retry policy
//! - [`worker`]: bounded worker pool with per-job timeouts
//! - [`scheduler`]: recurring and on-demand enqueueing

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod backoff;
pub mod error;
pub mod jobs;
pub mod queue;
pub mod scheduler;
pub mod worker;

pub use backoff::RetryPolicy;
pub use error::{Result, SchedulerError};
pub use jobs::{
    EnqueueRequest, JobKind, JobListQuery, JobPage, JobPayload, JobPriority, JobRecord,
    JobStatus, QueueCounts,
};
pub use queue::{JobQueue, MemoryJobQueue};
pub use scheduler::Scheduler;
pub use worker::{AttemptOutcome, JobFailure, JobHandler, WorkerPool, WorkerPoolConfig};
