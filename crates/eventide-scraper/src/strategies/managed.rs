use super::{min_delay_of, selectors_of, ExtractionStrategy};
use crate::error::{Result, ScrapeError};
use crate::http::parse_retry_after;
use crate::parser::ListingParser;
use async_trait::async_trait;
use eventide_browser::RateLimiter;
use eventide_core::RawEventData;
use eventide_sources::{EventSource, StrategyKind};
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde_json::json;
use tracing::{debug, warn};

/// Delegates rendering to a remote browser service speaking the browserless
/// `/content` protocol.
///
/// The service token travels in the query string, so request errors are
/// reported without their URL.
pub struct ManagedServiceStrategy {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    limiter: RateLimiter,
}

impl ManagedServiceStrategy {
    /// Create the strategy for the service at `base_url`.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        token: Option<String>,
        limiter: RateLimiter,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            limiter,
        }
    }

    fn endpoint(&self) -> String {
        match &self.token {
            Some(token) => format!("{}/content?token={token}", self.base_url),
            None => format!("{}/content", self.base_url),
        }
    }
}

#[async_trait]
impl ExtractionStrategy for ManagedServiceStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ManagedService
    }

    async fn extract(&self, source: &EventSource) -> Result<Vec<RawEventData>> {
        let selectors = selectors_of(source)?;

        self.limiter
            .acquire(&source.url, min_delay_of(source))
            .await
            .map_err(|e| ScrapeError::Extraction(e.to_string()))?;

        let mut body = json!({ "url": source.url });
        if let Some(selector) = &source.scrape_config.wait_for {
            body["waitForSelector"] = json!({ "selector": selector });
        }

        let response = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                ScrapeError::Extraction(format!("managed service request failed: {}", e.without_url()))
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = parse_retry_after(
                response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok()),
            );
            warn!(
                source_id = %source.id,
                retry_after_secs = retry_after.as_secs(),
                "rate limited by managed service"
            );
            if let Err(e) = self.limiter.penalize(&source.url, retry_after).await {
                debug!(source_id = %source.id, error = %e, "could not record host penalty");
            }
            return Err(ScrapeError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ScrapeError::Extraction(format!(
                "managed service returned HTTP {status}: {message}"
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| ScrapeError::Extraction(format!("managed service body: {}", e.without_url())))?;
        debug!(source_id = %source.id, bytes = html.len(), "rendered via managed service");

        ListingParser::new(selectors, &source.id, &source.url).parse(&html)
    }
}
