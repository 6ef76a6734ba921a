//! Extraction strategies.
//!
//! Each strategy is one way of turning a source's listing into
//! [`RawEventData`]. The orchestrator walks a source's chain in order and
//! stops at the first strategy that returns records.

mod headless;
mod json_api;
mod managed;
mod static_html;

pub use headless::HeadlessBrowserStrategy;
pub use json_api::{map_api_items, JsonApiStrategy};
pub use managed::ManagedServiceStrategy;
pub use static_html::StaticHtmlStrategy;

use crate::error::{Result, ScrapeError};
use async_trait::async_trait;
use eventide_browser::pick_user_agent;
use eventide_core::RawEventData;
use eventide_sources::{EventSource, Selectors, StrategyKind};
use std::time::Duration;

/// One way of extracting a source's events.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    /// Which chain entry this strategy implements.
    fn kind(&self) -> StrategyKind;

    /// Extract every event currently listed by `source`.
    ///
    /// An empty result is not an error here; the orchestrator treats it as a
    /// failed attempt and moves on.
    async fn extract(&self, source: &EventSource) -> Result<Vec<RawEventData>>;
}

/// The source's page selectors, or a configuration error.
pub(crate) fn selectors_of(source: &EventSource) -> Result<&Selectors> {
    source
        .scrape_config
        .selectors
        .as_ref()
        .ok_or_else(|| ScrapeError::Configuration {
            source_id: source.id.clone(),
            reason: "no selectors configured".to_string(),
        })
}

/// Per-source request spacing override.
pub(crate) fn min_delay_of(source: &EventSource) -> Option<Duration> {
    source
        .scrape_config
        .rate_limit
        .map(|r| Duration::from_millis(r.min_delay_ms))
}

/// User agent for the next request: the source's own list wins over the
/// global one.
pub(crate) fn user_agent_for(source: &EventSource, global: &[String]) -> String {
    if source.scrape_config.user_agents.is_empty() {
        pick_user_agent(global)
    } else {
        pick_user_agent(&source.scrape_config.user_agents)
    }
}
