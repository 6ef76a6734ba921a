//! Eventide Core - Foundation crate for the Eventide listing ingester.
//!
//! This crate provides shared types, error handling, configuration management,
//! and the event-store interface that all other Eventide crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Identifier newtypes (`SourceId`, `JobId`, `EventId`)
//! - [`event`] - `RawEventData`, `StoredEvent` and `DateRange`
//! - [`time`] - Lenient date parsing and canonical UTC rendering
//! - [`store`] - The `EventStore` persistence trait
//!
//! # Example
//!
//! ```rust
//! use eventide_core::{AppConfig, RawEventData, SourceId};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! assert_eq!(config.worker.concurrency, 3);
//!
//! let source = SourceId::new("city-arts-centre")?;
//! let event = RawEventData::new(source, "Jazz Concert at Cultural Centre");
//! assert!(event.start().is_none());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod event;
pub mod store;
pub mod time;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, DatabaseConfig, DedupConfig, LoggingConfig, RetryConfig, SchedulerConfig,
    ScrapingConfig, SourcesConfig, WorkerConfig,
};
pub use error::{
    ConfigError, ConfigResult, EventideError, Result, StoreError, StoreResult,
};
pub use event::{DateRange, RawEventData, StoredEvent};
pub use store::EventStore;
pub use types::{EventId, JobId, SourceId};
