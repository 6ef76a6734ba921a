use super::{min_delay_of, selectors_of, user_agent_for, ExtractionStrategy};
use crate::error::{Result, ScrapeError};
use crate::parser::ListingParser;
use async_trait::async_trait;
use eventide_browser::{BrowserEngine, BrowserError, PageRequest, RateLimiter};
use eventide_core::RawEventData;
use eventide_sources::{EventSource, StrategyKind};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::info;

/// Renders the listing in headless Chromium before parsing.
///
/// The browser is launched on first use and shared by every worker.
pub struct HeadlessBrowserStrategy {
    engine: OnceCell<BrowserEngine>,
    limiter: RateLimiter,
    user_agents: Vec<String>,
    page_timeout: Duration,
}

impl HeadlessBrowserStrategy {
    /// Create the strategy; no browser is started yet.
    #[must_use]
    pub fn new(limiter: RateLimiter, user_agents: Vec<String>, page_timeout: Duration) -> Self {
        Self {
            engine: OnceCell::new(),
            limiter,
            user_agents,
            page_timeout,
        }
    }

    async fn engine(&self) -> Result<&BrowserEngine> {
        self.engine
            .get_or_try_init(|| async {
                info!("launching headless browser");
                BrowserEngine::launch().await
            })
            .await
            .map_err(|e| ScrapeError::Extraction(format!("browser unavailable: {e}")))
    }
}

#[async_trait]
impl ExtractionStrategy for HeadlessBrowserStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::HeadlessBrowser
    }

    async fn extract(&self, source: &EventSource) -> Result<Vec<RawEventData>> {
        let selectors = selectors_of(source)?;
        let engine = self.engine().await?;

        self.limiter
            .acquire(&source.url, min_delay_of(source))
            .await
            .map_err(|e| ScrapeError::Extraction(e.to_string()))?;

        let request = PageRequest {
            url: source.url.clone(),
            wait_for: source.scrape_config.wait_for.clone(),
            wait_ms: source.scrape_config.wait_ms,
            user_agent: user_agent_for(source, &self.user_agents),
            timeout: self.page_timeout,
        };

        let html = engine
            .fetch_page_content(&request)
            .await
            .map_err(|e| match e {
                BrowserError::Timeout(_) => ScrapeError::Timeout(self.page_timeout),
                other => ScrapeError::Extraction(other.to_string()),
            })?;

        ListingParser::new(selectors, &source.id, &source.url).parse(&html)
    }
}
