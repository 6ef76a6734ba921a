//! Scrape error taxonomy.
//!
//! A single strategy failing is an [`ScrapeError::Extraction`] and only
//! triggers the next strategy; the caller sees
//! [`ScrapeError::AllStrategiesFailed`] once the whole chain is exhausted.

use eventide_core::{SourceId, StoreError};
use eventide_sources::StrategyKind;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// One strategy's failure inside a fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyFailure {
    /// Strategy that failed
    pub strategy: StrategyKind,
    /// Why it failed
    pub reason: String,
}

impl fmt::Display for StrategyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.strategy.as_str(), self.reason)
    }
}

fn join_failures(failures: &[StrategyFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised while scraping a source.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// A single strategy could not produce records
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// Every strategy in the chain failed
    #[error("all strategies failed for {source_id}: {}", join_failures(.failures))]
    AllStrategiesFailed {
        /// Source being scraped
        source_id: SourceId,
        /// Failures in chain order
        failures: Vec<StrategyFailure>,
    },

    /// A strategy or the whole scrape ran out of time
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The remote host asked us to back off
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// How long to wait before trying again
        retry_after: Duration,
    },

    /// Writing to the event store failed
    #[error("event store write failed: {0}")]
    Persistence(#[from] StoreError),

    /// Missing or invalid scrape configuration
    #[error("configuration error for {source_id}: {reason}")]
    Configuration {
        /// Misconfigured source
        source_id: SourceId,
        /// What is wrong
        reason: String,
    },

    /// Source exists but is deactivated
    #[error("source is inactive: {0}")]
    SourceInactive(SourceId),

    /// No source with this id
    #[error("source not found: {0}")]
    SourceNotFound(SourceId),
}

impl ScrapeError {
    /// Whether running the job again later could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Extraction(_)
                | Self::AllStrategiesFailed { .. }
                | Self::Timeout(_)
                | Self::RateLimited { .. }
                | Self::Persistence(_)
        )
    }

    /// Whether the failure is the source's fault and should raise its error count.
    #[must_use]
    pub fn counts_against_source(&self) -> bool {
        matches!(
            self,
            Self::Extraction(_)
                | Self::AllStrategiesFailed { .. }
                | Self::Timeout(_)
                | Self::Configuration { .. }
        )
    }
}

/// Result type for scrape operations.
pub type Result<T> = std::result::Result<T, ScrapeError>;
