//! Error types for the job subsystem.

use thiserror::Error;

/// Errors raised by job queues and the worker pool.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Job not found
    #[error("job not found: {job_id}")]
    NotFound {
        /// The missing job
        job_id: String,
    },

    /// Operation not allowed in the job's current state
    #[error("job {job_id} is {status}, expected {expected}")]
    InvalidState {
        /// The job
        job_id: String,
        /// Current state
        status: String,
        /// State the operation requires
        expected: String,
    },

    /// Backing storage failed
    #[error("queue storage error: {0}")]
    Storage(String),

    /// A stored payload or result could not be (de)serialized
    #[error("job serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for queue and scheduler operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;
