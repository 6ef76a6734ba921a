//! Shared HTTP client for the in-process strategies.
//!
//! Every request waits on the per-host [`RateLimiter`] first. A 429 response
//! pushes the host's next slot back and surfaces as
//! [`ScrapeError::RateLimited`].

use crate::error::{Result, ScrapeError};
use eventide_browser::RateLimiter;
use reqwest::header::{HeaderMap, IF_MODIFIED_SINCE, IF_NONE_MATCH, RETRY_AFTER, USER_AGENT};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, warn};

/// Back-off used when a 429 carries no usable `Retry-After`.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(300);

/// Cache validators from a previous response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validators {
    /// `ETag` header value
    pub etag: Option<String>,
    /// `Last-Modified` header value
    pub last_modified: Option<String>,
}

impl Validators {
    fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: reqwest::header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Self {
            etag: get(reqwest::header::ETAG),
            last_modified: get(reqwest::header::LAST_MODIFIED),
        }
    }

    /// Whether there is anything to send in a conditional request.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.etag.is_none() && self.last_modified.is_none()
    }
}

/// Outcome of a conditional fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conditional {
    /// 304 Not Modified
    NotModified,
    /// Fresh content and the validators it came with
    Modified(Validators),
}

/// Parse a `Retry-After` value given in seconds.
///
/// HTTP-date values and garbage fall back to [`DEFAULT_RETRY_AFTER`].
#[must_use]
pub fn parse_retry_after(value: Option<&str>) -> Duration {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(DEFAULT_RETRY_AFTER, Duration::from_secs)
}

/// Rate-limited HTTP fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    limiter: RateLimiter,
}

impl HttpFetcher {
    /// Create a fetcher sharing `limiter` with the other strategies.
    #[must_use]
    pub fn new(client: reqwest::Client, limiter: RateLimiter) -> Self {
        Self { client, limiter }
    }

    /// The shared rate limiter.
    #[must_use]
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// The underlying client.
    #[must_use]
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Wait for `url`'s host slot.
    pub async fn pace(&self, url: &str, min_delay: Option<Duration>) -> Result<()> {
        self.limiter
            .acquire(url, min_delay)
            .await
            .map_err(|e| ScrapeError::Extraction(e.to_string()))?;
        Ok(())
    }

    /// GET `url` and return the body text.
    pub async fn get_text(
        &self,
        url: &str,
        user_agent: &str,
        min_delay: Option<Duration>,
    ) -> Result<String> {
        self.pace(url, min_delay).await?;

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent)
            .send()
            .await
            .map_err(|e| ScrapeError::Extraction(format!("GET {url}: {e}")))?;

        let response = self.check_status(url, response).await?;
        response
            .text()
            .await
            .map_err(|e| ScrapeError::Extraction(format!("read body of {url}: {e}")))
    }

    /// GET `url` and decode the body as JSON.
    pub async fn get_json(
        &self,
        url: &str,
        user_agent: &str,
        min_delay: Option<Duration>,
    ) -> Result<serde_json::Value> {
        let body = self.get_text(url, user_agent, min_delay).await?;
        serde_json::from_str(&body)
            .map_err(|e| ScrapeError::Extraction(format!("invalid JSON from {url}: {e}")))
    }

    /// Conditional GET using `validators`. The body is discarded.
    pub async fn conditional_get(
        &self,
        url: &str,
        user_agent: &str,
        validators: &Validators,
    ) -> Result<Conditional> {
        self.pace(url, None).await?;

        let mut request = self.client.get(url).header(USER_AGENT, user_agent);
        if let Some(etag) = &validators.etag {
            request = request.header(IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = &validators.last_modified {
            request = request.header(IF_MODIFIED_SINCE, last_modified);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ScrapeError::Extraction(format!("conditional GET {url}: {e}")))?;

        if response.status() == StatusCode::NOT_MODIFIED {
            debug!(url, "listing not modified");
            return Ok(Conditional::NotModified);
        }

        let response = self.check_status(url, response).await?;
        Ok(Conditional::Modified(Validators::from_headers(response.headers())))
    }

    async fn check_status(&self, url: &str, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = parse_retry_after(
                response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok()),
            );
            warn!(url, retry_after_secs = retry_after.as_secs(), "rate limited by host");
            if let Err(e) = self.limiter.penalize(url, retry_after).await {
                debug!(url, error = %e, "could not record host penalty");
            }
            return Err(ScrapeError::RateLimited { retry_after });
        }

        if !status.is_success() {
            return Err(ScrapeError::Extraction(format!("GET {url}: HTTP {status}")));
        }

        Ok(response)
    }
}
