//! Error type for admin commands.

use eventide_core::EventideError;
use eventide_db::DatabaseError;
use eventide_scheduler::SchedulerError;
use eventide_sources::SourceError;
use serde::Serialize;

/// Serializable error returned by every admin command.
#[derive(Debug, Serialize)]
pub struct CommandError {
    /// Stable error code for callers (e.g., "SOURCE_NOT_FOUND")
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Optional structured context
    pub details: Option<serde_json::Value>,
}

impl CommandError {
    /// Create a new command error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Create a command error with details.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Some(details),
        }
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CommandError {}

impl From<SourceError> for CommandError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::NotFound { source_id } => Self::with_details(
                "SOURCE_NOT_FOUND",
                format!("Source not found: {source_id}"),
                serde_json::json!({ "source_id": source_id }),
            ),
            SourceError::AlreadyExists { source_id } => Self::with_details(
                "SOURCE_EXISTS",
                format!("Source already exists: {source_id}"),
                serde_json::json!({ "source_id": source_id }),
            ),
            SourceError::ValidationError { source_id, reason } => Self::with_details(
                "INVALID_SOURCE",
                format!("Invalid source {source_id}: {reason}"),
                serde_json::json!({ "source_id": source_id }),
            ),
            SourceError::InvalidId(e) => Self::new("INVALID_ID", e.to_string()),
            SourceError::DirectoryNotFound { path } => Self::with_details(
                "DEFINITIONS_NOT_FOUND",
                "Source definitions directory not found",
                serde_json::json!({ "path": path }),
            ),
            SourceError::LoadError { .. } | SourceError::ParseError { .. } | SourceError::Io(_) => {
                Self::new("IMPORT_FAILED", err.to_string())
            }
            SourceError::Store(msg) => Self::new("DATABASE_ERROR", format!("Source store error: {msg}")),
        }
    }
}

impl From<SchedulerError> for CommandError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::NotFound { job_id } => Self::with_details(
                "JOB_NOT_FOUND",
                format!("Job not found: {job_id}"),
                serde_json::json!({ "job_id": job_id }),
            ),
            SchedulerError::InvalidState {
                job_id,
                status,
                expected,
            } => Self::with_details(
                "INVALID_JOB_STATE",
                format!("Job {job_id} is {status}, expected {expected}"),
                serde_json::json!({ "job_id": job_id, "status": status }),
            ),
            SchedulerError::Storage(msg) => Self::new("QUEUE_ERROR", format!("Queue error: {msg}")),
            SchedulerError::Serialization(e) => {
                Self::new("SERIALIZATION_ERROR", format!("Serialization error: {e}"))
            }
        }
    }
}

impl From<DatabaseError> for CommandError {
    fn from(err: DatabaseError) -> Self {
        Self::new("DATABASE_ERROR", format!("Database error: {err}"))
    }
}

impl From<EventideError> for CommandError {
    fn from(err: EventideError) -> Self {
        match err {
            EventideError::Validation(msg) => Self::new("INVALID_ID", msg),
            other => Self::new("INTERNAL_ERROR", other.to_string()),
        }
    }
}
