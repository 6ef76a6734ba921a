//! Pre-scrape freshness check.
//!
//! A conditional GET against the listing URL with the validators from the
//! last successful scrape. A 304 lets the orchestrator skip extraction. The
//! new validators are only committed after the scrape they belong to
//! succeeds, so a failed scrape is retried in full next time.

use crate::http::{Conditional, HttpFetcher, Validators};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Result of a freshness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    /// Nothing changed since the last successful scrape
    Unchanged,
    /// Content changed (or could not be checked); validators to commit on success
    Changed(Validators),
}

/// Tracks listing validators per URL.
pub struct FreshnessChecker {
    http: HttpFetcher,
    user_agent: String,
    validators: Mutex<HashMap<String, Validators>>,
}

impl FreshnessChecker {
    /// Create a checker with no remembered validators.
    #[must_use]
    pub fn new(http: HttpFetcher, user_agent: String) -> Self {
        Self {
            http,
            user_agent,
            validators: Mutex::new(HashMap::new()),
        }
    }

    fn known(&self, url: &str) -> Option<Validators> {
        self.validators
            .lock()
            .expect("acquire validators lock")
            .get(url)
            .cloned()
    }

    /// Revalidate `url`.
    ///
    /// Without stored validators the request is a plain GET that only learns
    /// them. Request errors count as changed; the real fetch will surface them.
    pub async fn check(&self, url: &str) -> Freshness {
        let known = self.known(url).unwrap_or_default();

        match self.http.conditional_get(url, &self.user_agent, &known).await {
            Ok(Conditional::NotModified) if !known.is_empty() => Freshness::Unchanged,
            Ok(Conditional::NotModified) => Freshness::Changed(Validators::default()),
            Ok(Conditional::Modified(fresh)) => Freshness::Changed(fresh),
            Err(e) => {
                debug!(url, error = %e, "freshness check failed");
                Freshness::Changed(Validators::default())
            }
        }
    }

    /// Remember `validators` for `url` after a successful scrape.
    pub fn commit(&self, url: &str, validators: Validators) {
        let mut map = self.validators.lock().expect("acquire validators lock");
        if validators.is_empty() {
            map.remove(url);
        } else {
            map.insert(url.to_string(), validators);
        }
    }
}
