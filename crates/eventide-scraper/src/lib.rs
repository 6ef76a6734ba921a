//! Eventide Scraper - per-source extraction and dedup routing.
//!
//! A source is scraped by walking its fallback chain of
//! [`ExtractionStrategy`] implementations until one returns records. Each
//! record is then normalized, hashed and either skipped, merged into a stored
//! event or created, in extraction order.
//!
//! # Example
//!
//! ```rust,ignore
//! use eventide_scraper::{ScrapeOrchestrator, StaticHtmlStrategy};
//! use std::sync::Arc;
//!
//! let orchestrator = ScrapeOrchestrator::new(registry, event_store, DedupEngine::default())
//!     .with_strategy(Arc::new(StaticHtmlStrategy::new(http, user_agents)))
//!     .with_max_concurrent_scrapes(3);
//!
//! let result = orchestrator.scrape_source(&source_id, None).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod freshness;
pub mod http;
pub mod orchestrator;
pub mod parser;
pub mod strategies;

pub use error::{Result, ScrapeError, StrategyFailure};
pub use freshness::{Freshness, FreshnessChecker};
pub use http::{HttpFetcher, Validators};
pub use orchestrator::{BatchSummary, ScrapeJobResult, ScrapeOrchestrator, DEFAULT_STRATEGY_TIMEOUT};
pub use parser::ListingParser;
pub use strategies::{
    map_api_items, ExtractionStrategy, HeadlessBrowserStrategy, JsonApiStrategy,
    ManagedServiceStrategy, StaticHtmlStrategy,
};
