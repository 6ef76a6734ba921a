//! Scrape orchestrator.
//!
//! Runs a source's extraction fallback chain and routes every extracted
//! record through deduplication into the event store. Batch runs scrape
//! sources concurrently and isolate each source's failure.

use crate::error::{Result, ScrapeError, StrategyFailure};
use crate::freshness::{Freshness, FreshnessChecker};
use crate::http::Validators;
use crate::strategies::ExtractionStrategy;
use chrono::{DateTime, Utc};
use eventide_core::{DateRange, EventStore, JobId, RawEventData, SourceId, StoreError, StoredEvent};
use eventide_dedup::{merge_changes, merge_event_data, normalize_event_data, DedupDecision, DedupEngine};
use eventide_scheduler::JobStatus;
use eventide_sources::{EventSource, SourceRegistry, StrategyKind};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default per-strategy timeout.
pub const DEFAULT_STRATEGY_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of scraping one source.
///
/// `events_found` always equals `events_created + events_updated + events_skipped`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeJobResult {
    /// Job the scrape ran under, if any
    pub job_id: Option<JobId>,
    /// Scraped source
    pub source_id: SourceId,
    /// `Completed` or `Failed`
    pub status: JobStatus,
    /// Strategy that produced the records
    pub strategy: Option<StrategyKind>,
    /// Start of the scrape
    pub started_at: DateTime<Utc>,
    /// End of the scrape
    pub completed_at: DateTime<Utc>,
    /// Records extracted
    pub events_found: u32,
    /// Records stored as new events
    pub events_created: u32,
    /// Records merged into existing events
    pub events_updated: u32,
    /// Exact duplicates and merges that changed nothing
    pub events_skipped: u32,
    /// Failure reason
    pub error_message: Option<String>,
    /// Freshness check reported the listing unchanged
    pub not_modified: bool,
}

impl ScrapeJobResult {
    fn completed(job_id: Option<JobId>, source_id: SourceId, started_at: DateTime<Utc>) -> Self {
        Self {
            job_id,
            source_id,
            status: JobStatus::Completed,
            strategy: None,
            started_at,
            completed_at: Utc::now(),
            events_found: 0,
            events_created: 0,
            events_updated: 0,
            events_skipped: 0,
            error_message: None,
            not_modified: false,
        }
    }

    /// A failed result carrying `error`'s message and zero counts.
    #[must_use]
    pub fn failed(
        job_id: Option<JobId>,
        source_id: SourceId,
        started_at: DateTime<Utc>,
        error: &ScrapeError,
    ) -> Self {
        Self {
            status: JobStatus::Failed,
            error_message: Some(error.to_string()),
            ..Self::completed(job_id, source_id, started_at)
        }
    }

    /// Wall-clock duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        u64::try_from((self.completed_at - self.started_at).num_milliseconds()).unwrap_or(0)
    }
}

/// Aggregate of a multi-source run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// One result per attempted source, ordered by source id
    pub results: Vec<ScrapeJobResult>,
    /// Sources that completed
    pub succeeded: u32,
    /// Sources that failed
    pub failed: u32,
    /// Sum of `events_found`
    pub events_found: u32,
    /// Sum of `events_created`
    pub events_created: u32,
    /// Sum of `events_updated`
    pub events_updated: u32,
    /// Sum of `events_skipped`
    pub events_skipped: u32,
}

impl BatchSummary {
    /// Total up `results`.
    #[must_use]
    pub fn from_results(mut results: Vec<ScrapeJobResult>) -> Self {
        results.sort_by(|a, b| a.source_id.cmp(&b.source_id));

        let mut summary = Self::default();
        for result in &results {
            if result.status == JobStatus::Completed {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
            summary.events_found += result.events_found;
            summary.events_created += result.events_created;
            summary.events_updated += result.events_updated;
            summary.events_skipped += result.events_skipped;
        }
        summary.results = results;
        summary
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct DedupCounts {
    found: u32,
    created: u32,
    updated: u32,
    skipped: u32,
}

/// One async mutex per source so two jobs never scrape the same source at once.
#[derive(Default)]
struct SourceLocks {
    inner: Mutex<HashMap<SourceId, Arc<tokio::sync::Mutex<()>>>>,
}

impl SourceLocks {
    fn lock_for(&self, id: &SourceId) -> Arc<tokio::sync::Mutex<()>> {
        self.inner
            .lock()
            .expect("acquire source locks")
            .entry(id.clone())
            .or_default()
            .clone()
    }
}

/// Coordinates extraction, deduplication and persistence per source.
pub struct ScrapeOrchestrator {
    registry: Arc<SourceRegistry>,
    store: Arc<dyn EventStore>,
    dedup: DedupEngine,
    strategies: HashMap<StrategyKind, Arc<dyn ExtractionStrategy>>,
    freshness: Option<Arc<FreshnessChecker>>,
    locks: SourceLocks,
    strategy_timeout: Duration,
    max_concurrent_scrapes: usize,
}

impl ScrapeOrchestrator {
    /// Create an orchestrator with no strategies registered.
    #[must_use]
    pub fn new(registry: Arc<SourceRegistry>, store: Arc<dyn EventStore>, dedup: DedupEngine) -> Self {
        Self {
            registry,
            store,
            dedup,
            strategies: HashMap::new(),
            freshness: None,
            locks: SourceLocks::default(),
            strategy_timeout: DEFAULT_STRATEGY_TIMEOUT,
            max_concurrent_scrapes: 3,
        }
    }

    /// Register `strategy`, replacing any previous one of the same kind.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Arc<dyn ExtractionStrategy>) -> Self {
        self.strategies.insert(strategy.kind(), strategy);
        self
    }

    /// Revalidate listings with conditional requests before extracting.
    #[must_use]
    pub fn with_freshness(mut self, checker: Arc<FreshnessChecker>) -> Self {
        self.freshness = Some(checker);
        self
    }

    /// Timeout for strategies whose source sets none.
    #[must_use]
    pub fn with_strategy_timeout(mut self, timeout: Duration) -> Self {
        self.strategy_timeout = timeout;
        self
    }

    /// Set the maximum number of sources scraped at once by [`Self::scrape_all`].
    #[must_use]
    pub fn with_max_concurrent_scrapes(mut self, max: usize) -> Self {
        self.max_concurrent_scrapes = max.max(1);
        self
    }

    /// Registry this orchestrator reads sources from.
    #[must_use]
    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    /// Scrape one source.
    ///
    /// Failures that are the source's fault raise its error count, which may
    /// deactivate it. Sources without a fallback chain are rejected up front
    /// and never counted.
    pub async fn scrape_source(&self, id: &SourceId, job_id: Option<JobId>) -> Result<ScrapeJobResult> {
        let source = self
            .registry
            .get(id)
            .map_err(|_| ScrapeError::SourceNotFound(id.clone()))?;
        if !source.is_active {
            return Err(ScrapeError::SourceInactive(id.clone()));
        }
        if !source.is_scraped() {
            return Err(ScrapeError::Configuration {
                source_id: id.clone(),
                reason: format!("{} sources are not scraped", source.source_type.as_str()),
            });
        }

        let _guard = self.locks.lock_for(id).lock_owned().await;

        let started_at = Utc::now();
        let clock = Instant::now();

        match self.run(&source, job_id, started_at).await {
            Ok(result) => {
                if let Err(e) = self.registry.record_success(id).await {
                    warn!(source_id = %id, error = %e, "could not stamp successful scrape");
                }
                info!(
                    source_id = %id,
                    strategy = result.strategy.map_or("none", StrategyKind::as_str),
                    found = result.events_found,
                    created = result.events_created,
                    updated = result.events_updated,
                    skipped = result.events_skipped,
                    not_modified = result.not_modified,
                    duration_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "source scrape finished"
                );
                Ok(result)
            }
            Err(e) => {
                warn!(source_id = %id, error = %e, "source scrape failed");
                if e.counts_against_source() {
                    if let Err(record_err) = self.registry.record_failure(id).await {
                        warn!(source_id = %id, error = %record_err, "could not record source failure");
                    }
                }
                Err(e)
            }
        }
    }

    /// Scrape every active source that has a fallback chain, at most
    /// `max_concurrent_scrapes` at a time.
    ///
    /// One source failing never stops the others.
    pub async fn scrape_all(&self, job_id: Option<JobId>) -> BatchSummary {
        let sources = self.registry.scrapable_sources();
        info!(sources = sources.len(), "starting batch scrape");

        let mut futures = FuturesUnordered::new();
        let mut results = Vec::with_capacity(sources.len());

        for source in sources {
            let job_id = job_id.clone();
            futures.push(async move {
                let started_at = Utc::now();
                match self.scrape_source(&source.id, job_id.clone()).await {
                    Ok(result) => result,
                    Err(e) => ScrapeJobResult::failed(job_id, source.id, started_at, &e),
                }
            });

            while futures.len() >= self.max_concurrent_scrapes {
                if let Some(result) = futures.next().await {
                    results.push(result);
                }
            }
        }

        while let Some(result) = futures.next().await {
            results.push(result);
        }

        let summary = BatchSummary::from_results(results);
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            found = summary.events_found,
            created = summary.events_created,
            updated = summary.events_updated,
            skipped = summary.events_skipped,
            "batch scrape finished"
        );
        summary
    }

    async fn run(
        &self,
        source: &EventSource,
        job_id: Option<JobId>,
        started_at: DateTime<Utc>,
    ) -> Result<ScrapeJobResult> {
        let chain = source.scrape_config.strategy_chain(source.source_type);

        let mut validators = Validators::default();
        if let Some(checker) = &self.freshness {
            match checker.check(&source.url).await {
                Freshness::Unchanged => {
                    debug!(source_id = %source.id, "listing unchanged, skipping extraction");
                    let mut result = ScrapeJobResult::completed(job_id, source.id.clone(), started_at);
                    result.not_modified = true;
                    return Ok(result);
                }
                Freshness::Changed(fresh) => validators = fresh,
            }
        }

        let (strategy, events) = self.extract(source, &chain).await?;
        let counts = self.deduplicate(source, events).await?;

        if let Some(checker) = &self.freshness {
            checker.commit(&source.url, validators);
        }

        let mut result = ScrapeJobResult::completed(job_id, source.id.clone(), started_at);
        result.strategy = Some(strategy);
        result.events_found = counts.found;
        result.events_created = counts.created;
        result.events_updated = counts.updated;
        result.events_skipped = counts.skipped;
        Ok(result)
    }

    /// Walk the fallback chain until a strategy returns records.
    ///
    /// Configuration and rate-limit errors end the chain early: every other
    /// strategy would hit the same selectors or the same host.
    async fn extract(
        &self,
        source: &EventSource,
        chain: &[StrategyKind],
    ) -> Result<(StrategyKind, Vec<RawEventData>)> {
        let timeout = source
            .scrape_config
            .timeout_secs
            .map_or(self.strategy_timeout, Duration::from_secs);
        let mut failures = Vec::new();

        for &kind in chain {
            let Some(strategy) = self.strategies.get(&kind) else {
                failures.push(StrategyFailure {
                    strategy: kind,
                    reason: "strategy not available".to_string(),
                });
                continue;
            };

            debug!(source_id = %source.id, strategy = kind.as_str(), "trying strategy");

            let reason = match tokio::time::timeout(timeout, strategy.extract(source)).await {
                Ok(Ok(events)) if !events.is_empty() => return Ok((kind, events)),
                Ok(Ok(_)) => "no events found".to_string(),
                Ok(Err(e @ (ScrapeError::Configuration { .. } | ScrapeError::RateLimited { .. }))) => {
                    return Err(e);
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => ScrapeError::Timeout(timeout).to_string(),
            };

            debug!(source_id = %source.id, strategy = kind.as_str(), reason = %reason, "strategy failed");
            failures.push(StrategyFailure {
                strategy: kind,
                reason,
            });
        }

        Err(ScrapeError::AllStrategiesFailed {
            source_id: source.id.clone(),
            failures,
        })
    }

    /// Route records through dedup in extraction order.
    ///
    /// Each record is written before the next one is examined, so a later
    /// record can merge into one created earlier in the same pass. Hashes of
    /// stored events in the pass's date span are fetched once up front;
    /// undated records fall back to a lookup each.
    async fn deduplicate(&self, source: &EventSource, events: Vec<RawEventData>) -> Result<DedupCounts> {
        let mut counts = DedupCounts::default();
        let events: Vec<RawEventData> = events.iter().map(normalize_event_data).collect();
        let mut known = self.prefetch_hashes(&events).await?;

        for mut event in events {
            counts.found += 1;

            let hash = self.dedup.hash(&event);
            event.scrape_hash = Some(hash.clone());

            if event.start().is_none()
                && !known.contains(&hash)
                && self.store.find_by_hash(&hash).await?.is_some()
            {
                known.push(hash.clone());
            }
            let candidates = if known.contains(&hash) {
                Vec::new()
            } else {
                self.candidates_for(&event, source.category.as_deref()).await?
            };

            match self.dedup.decide(&event, &hash, &known, &candidates) {
                DedupDecision::ExactDuplicate => {
                    counts.skipped += 1;
                }
                DedupDecision::Merge(found) => {
                    let existing = candidates
                        .iter()
                        .find(|c| c.id == found.event_id)
                        .ok_or_else(|| StoreError::NotFound(found.event_id.to_string()))?;
                    if !merge_changes(&existing.data, &event) {
                        debug!(
                            source_id = %source.id,
                            event_id = %found.event_id,
                            "variant adds nothing to existing event"
                        );
                        counts.skipped += 1;
                        known.push(hash);
                        continue;
                    }
                    let updated = StoredEvent {
                        data: merge_event_data(&existing.data, &event),
                        updated_at: Utc::now(),
                        ..existing.clone()
                    };
                    self.store.update(&updated).await?;
                    debug!(
                        source_id = %source.id,
                        event_id = %found.event_id,
                        similarity = found.similarity,
                        match_type = ?found.match_type,
                        "merged into existing event"
                    );
                    counts.updated += 1;
                }
                DedupDecision::Create { near_miss } => {
                    if let Some((event_id, score)) = near_miss {
                        debug!(
                            source_id = %source.id,
                            event_id = %event_id,
                            similarity = score,
                            threshold = self.dedup.config().combined_similarity_threshold,
                            "near miss, treating as distinct event"
                        );
                    }
                    self.store
                        .create(&StoredEvent::new(event, source.category.clone()))
                        .await?;
                    counts.created += 1;
                }
            }

            known.push(hash);
        }

        Ok(counts)
    }

    /// Hashes of stored events near the dated records of a pass.
    ///
    /// The span is padded by the candidate window on both sides: a merge can
    /// move a stored event's start away from the listing its hash came from,
    /// but never further than a candidate could be.
    async fn prefetch_hashes(&self, events: &[RawEventData]) -> Result<Vec<String>> {
        let mut starts = events.iter().filter_map(RawEventData::start);
        let Some(first) = starts.next() else {
            return Ok(Vec::new());
        };
        let (earliest, latest) = starts.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
        let hours = self.dedup.config().candidate_window_hours;
        let span = DateRange {
            start: DateRange::around(earliest, hours).start,
            end: DateRange::around(latest, hours).end,
        };
        Ok(self.store.known_hashes_in_window(span).await?)
    }

    async fn candidates_for(&self, event: &RawEventData, category: Option<&str>) -> Result<Vec<StoredEvent>> {
        let Some(start) = event.start() else {
            return Ok(Vec::new());
        };
        let window = DateRange::around(start, self.dedup.config().candidate_window_hours);
        Ok(self.store.find_candidates_in_window(window, category).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(source: &str, status: JobStatus, counts: (u32, u32, u32)) -> ScrapeJobResult {
        let source_id = SourceId::new(source).expect("valid id");
        let mut result = ScrapeJobResult::completed(None, source_id, Utc::now());
        result.status = status;
        result.events_created = counts.0;
        result.events_updated = counts.1;
        result.events_skipped = counts.2;
        result.events_found = counts.0 + counts.1 + counts.2;
        result
    }

    #[test]
    fn test_batch_summary_totals() {
        let summary = BatchSummary::from_results(vec![
            result("zoo-events", JobStatus::Completed, (2, 1, 3)),
            result("art-hall", JobStatus::Failed, (0, 0, 0)),
            result("market", JobStatus::Completed, (1, 0, 0)),
        ]);

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.events_found, 7);
        assert_eq!(
            summary.events_found,
            summary.events_created + summary.events_updated + summary.events_skipped
        );
        let order: Vec<&str> = summary.results.iter().map(|r| r.source_id.as_str()).collect();
        assert_eq!(order, vec!["art-hall", "market", "zoo-events"]);
    }

    #[test]
    fn test_failed_result_keeps_message() {
        let source_id = SourceId::new("art-hall").expect("valid id");
        let failed = ScrapeJobResult::failed(
            Some(JobId::generate()),
            source_id.clone(),
            Utc::now(),
            &ScrapeError::SourceInactive(source_id),
        );
        assert_eq!(failed.status, JobStatus::Failed);
        assert!(failed.error_message.as_deref().unwrap_or_default().contains("inactive"));
        assert_eq!(failed.events_found, 0);
    }
}
