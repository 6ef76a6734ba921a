//! Per-host request pacing.
//!
//! Callers wait for their slot instead of failing; slots are reserved under
//! the lock so concurrent callers to one host queue up behind each other.

use crate::error::{BrowserError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Host name of `url`.
pub fn extract_domain(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url).map_err(|e| BrowserError::InvalidUrl(format!("{url}: {e}")))?;

    parsed
        .host_str()
        .map(str::to_string)
        .ok_or_else(|| BrowserError::InvalidUrl(format!("{url}: no host")))
}

/// Rate limiter per domain
#[derive(Debug, Clone)]
pub struct RateLimiter {
    next_slot: Arc<Mutex<HashMap<String, Instant>>>,
    default_delay: Duration,
}

impl RateLimiter {
    pub fn new(default_delay_ms: u64) -> Self {
        Self {
            next_slot: Arc::new(Mutex::new(HashMap::new())),
            default_delay: Duration::from_millis(default_delay_ms),
        }
    }

    /// Wait until a request to `url`'s host is allowed.
    ///
    /// `min_delay` overrides the default spacing for this request. Returns
    /// how long the caller waited.
    pub async fn acquire(&self, url: &str, min_delay: Option<Duration>) -> Result<Duration> {
        let domain = extract_domain(url)?;
        let delay = min_delay.unwrap_or(self.default_delay);

        let slot = {
            let mut slots = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = slots.get(&domain).copied().filter(|s| *s > now).unwrap_or(now);
            slots.insert(domain.clone(), slot + delay);
            slot
        };

        let wait = slot.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            debug!(domain = %domain, wait_secs = wait.as_secs_f64(), "rate limiting request");
            tokio::time::sleep_until(slot).await;
        }

        Ok(wait)
    }

    /// Push the next slot for `url`'s host at least `delay` into the future,
    /// e.g. after a 429 response.
    pub async fn penalize(&self, url: &str, delay: Duration) -> Result<()> {
        let domain = extract_domain(url)?;
        let until = Instant::now() + delay;

        let mut slots = self.next_slot.lock().await;
        let entry = slots.entry(domain).or_insert(until);
        if *entry < until {
            *entry = until;
        }
        Ok(())
    }
}
