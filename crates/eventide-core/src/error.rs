//! Core error types for Eventide.
//!
//! This module defines the central error type used across all subsystems
//! together with the configuration and event-store error types.

use thiserror::Error;

/// Central error type for shared Eventide operations.
#[derive(Error, Debug)]
pub enum EventideError {
    /// Configuration errors (file loading, parsing, validation)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Event store errors (create, update, query)
    #[error("event store error: {0}")]
    Store(#[from] StoreError),

    /// Validation errors (invalid input, constraints)
    #[error("validation error: {0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Config file not found
    #[error("config file not found at {path}")]
    NotFound {
        /// Path where config was expected
        path: String,
    },

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// I/O error reading/writing config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Errors surfaced by an [`EventStore`](crate::store::EventStore) implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing store could not be reached.
    #[error("event store unavailable: {0}")]
    Unavailable(String),

    /// The event to update does not exist.
    #[error("event not found: {0}")]
    NotFound(String),

    /// A write was rejected; nothing was committed.
    #[error("event write failed: {0}")]
    Write(String),

    /// A query failed or returned undecodable rows.
    #[error("event query failed: {0}")]
    Query(String),
}

/// Result type alias using `EventideError`.
pub type Result<T> = std::result::Result<T, EventideError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for event store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
