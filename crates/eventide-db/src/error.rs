//! Database error types.
//!
//! Each store implementation also converts these into the error type of the
//! trait it implements (`StoreError`, `SourceError`, `SchedulerError`).

use eventide_core::StoreError;
use eventide_scheduler::SchedulerError;
use eventide_sources::SourceError;
use thiserror::Error;

/// Database-specific errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to open or create database connection.
    #[error("failed to open database: {0}")]
    Open(String),

    /// Gave up connecting after the configured number of attempts.
    #[error("database unreachable after {attempts} attempts: {last_error}")]
    Unreachable {
        /// Attempts made
        attempts: u32,
        /// Error from the final attempt
        last_error: String,
    },

    /// Migration execution failed.
    #[error("migration failed: {0}")]
    Migration(String),

    /// Requested record was not found.
    #[error("{0}")]
    NotFound(String),

    /// Failed to decode database value.
    #[error("decode error: {0}")]
    Decode(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Underlying `SQLx` error.
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Whether the failure is about reaching the database rather than the query.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        match self {
            Self::Open(_) | Self::Unreachable { .. } => true,
            Self::Sqlx(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            _ => false,
        }
    }
}

impl From<DatabaseError> for StoreError {
    fn from(e: DatabaseError) -> Self {
        if e.is_connectivity() {
            return StoreError::Unavailable(e.to_string());
        }
        match e {
            DatabaseError::NotFound(msg) => StoreError::NotFound(msg),
            DatabaseError::Decode(_) | DatabaseError::Serialization(_) => {
                StoreError::Query(e.to_string())
            }
            other => StoreError::Write(other.to_string()),
        }
    }
}

impl From<DatabaseError> for SourceError {
    fn from(e: DatabaseError) -> Self {
        SourceError::Store(e.to_string())
    }
}

impl From<DatabaseError> for SchedulerError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::Serialization(e) => SchedulerError::Serialization(e),
            other => SchedulerError::Storage(other.to_string()),
        }
    }
}

/// Result type alias for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
