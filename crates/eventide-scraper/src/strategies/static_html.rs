use super::{min_delay_of, selectors_of, user_agent_for, ExtractionStrategy};
use crate::error::Result;
use crate::http::HttpFetcher;
use crate::parser::ListingParser;
use async_trait::async_trait;
use eventide_core::RawEventData;
use eventide_sources::{EventSource, StrategyKind};
use tracing::debug;

/// Plain HTTP fetch plus selector parsing. Cheapest strategy; fails on
/// listings rendered client-side.
pub struct StaticHtmlStrategy {
    http: HttpFetcher,
    user_agents: Vec<String>,
}

impl StaticHtmlStrategy {
    /// Create the strategy over a shared fetcher.
    #[must_use]
    pub fn new(http: HttpFetcher, user_agents: Vec<String>) -> Self {
        Self { http, user_agents }
    }
}

#[async_trait]
impl ExtractionStrategy for StaticHtmlStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::StaticHtml
    }

    async fn extract(&self, source: &EventSource) -> Result<Vec<RawEventData>> {
        let selectors = selectors_of(source)?;
        let user_agent = user_agent_for(source, &self.user_agents);

        let html = self
            .http
            .get_text(&source.url, &user_agent, min_delay_of(source))
            .await?;
        debug!(source_id = %source.id, bytes = html.len(), "fetched static listing");

        ListingParser::new(selectors, &source.id, &source.url).parse(&html)
    }
}
