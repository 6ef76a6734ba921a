//! Error types for the source subsystem.

use thiserror::Error;

/// Errors that can occur in source registry operations.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Source not found
    #[error("source not found: {source_id}")]
    NotFound {
        /// The source ID that was not found
        source_id: String,
    },

    /// A source with this ID already exists
    #[error("source already exists: {source_id}")]
    AlreadyExists {
        /// The conflicting source ID
        source_id: String,
    },

    /// Failed to load a source definition from file
    #[error("failed to load source definition from {path}: {source}")]
    LoadError {
        /// Path to the definition file
        path: String,
        /// Underlying error
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to parse source definition TOML
    #[error("failed to parse source definition TOML in {path}: {source}")]
    ParseError {
        /// Path to the definition file
        path: String,
        /// TOML parse error
        #[source]
        source: toml::de::Error,
    },

    /// Invalid source definition (validation failed)
    #[error("invalid source definition for {source_id}: {reason}")]
    ValidationError {
        /// Source ID being validated
        source_id: String,
        /// Reason for validation failure
        reason: String,
    },

    /// Source definition directory not found
    #[error("source definitions directory not found at {path}")]
    DirectoryNotFound {
        /// Expected directory path
        path: String,
    },

    /// The persistent source store rejected an operation
    #[error("source store error: {0}")]
    Store(String),

    /// I/O error while accessing source definitions
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid source ID format
    #[error("invalid source ID: {0}")]
    InvalidId(#[from] eventide_core::EventideError),
}

/// Result type for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;
