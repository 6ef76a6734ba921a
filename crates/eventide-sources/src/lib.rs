//! Eventide Sources - configuration and lifecycle of scrape sources.
//!
//! This crate owns every [`EventSource`]: its URL, type, selectors and rate
//! limit, plus the error bookkeeping that deactivates broken sources.
//!
//! # Architecture
//!
//! - **Definition Types** ([`definition`]): sources and their scrape configuration
//! - **Loader** ([`loader`]): TOML import from `source-definitions/`
//! - **Store** ([`store`]): persistence seam
//! - **Registry** ([`registry`]): in-memory cache with CRUD and lifecycle operations
//! - **Errors** ([`error`]): source-specific error types
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use eventide_sources::{MemorySourceStore, SourceFilter, SourceRegistry};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = SourceRegistry::new(Arc::new(MemorySourceStore::new()), 5);
//! registry.initialize().await?;
//!
//! for source in registry.list(&SourceFilter::active()) {
//!     println!("{}: {}", source.id, source.url);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod definition;
pub mod error;
pub mod loader;
pub mod registry;
pub mod store;

pub use definition::{
    ApiMapping, EventSource, RateLimit, ScrapeConfig, Selectors, SourceDefinition,
    SourceMetadata, SourceType, SourceUpdate, StrategyKind,
};
pub use error::{Result, SourceError};
pub use loader::SourceLoader;
pub use registry::{FailureOutcome, ImportSummary, SourceFilter, SourceRegistry};
pub use store::{MemorySourceStore, SourceStore};
