//! Eventide Deduplication
//!
//! Pure functions that decide whether a freshly extracted listing is a new
//! event, an exact repeat, or a variant of something already stored.
//!
//! - [`normalize`]: whitespace and date canonicalization
//! - [`hash`]: content hashing for exact duplicates
//! - [`similarity`] and [`matcher`]: weighted fuzzy matching
//! - [`merge`]: field-level merge into the stored record
//! - [`quality`]: completeness scoring
//!
//! Nothing here performs I/O; the orchestrator supplies known hashes and
//! candidate windows from the event store.
//!
//! # Example
//!
//! ```
//! use eventide_core::{DedupConfig, RawEventData, SourceId};
//! use eventide_dedup::DedupEngine;
//!
//! let engine = DedupEngine::new(DedupConfig::default());
//! let source = SourceId::new("city-arts").unwrap();
//! let a = RawEventData::new(source.clone(), "Jazz  Night");
//! let b = RawEventData::new(source, "jazz night");
//! assert_eq!(engine.hash(&a), engine.hash(&b));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod hash;
pub mod matcher;
pub mod merge;
pub mod normalize;
pub mod quality;
pub mod similarity;

pub use hash::{generate_event_hash, is_exact_duplicate};
pub use matcher::{find_similar_events, MatchType, SignalScores, SimilarityMatch};
pub use merge::{merge_changes, merge_event_data};
pub use normalize::normalize_event_data;
pub use quality::calculate_event_quality_score;
pub use similarity::{calculate_string_similarity, calculate_time_similarity};

use eventide_core::{DedupConfig, EventId, RawEventData, StoredEvent};

/// Outcome of deduplicating one extracted record.
#[derive(Debug, Clone, PartialEq)]
pub enum DedupDecision {
    /// Same content hash as a stored event
    ExactDuplicate,
    /// Fuzzy match; merge into the best-scoring stored event
    Merge(SimilarityMatch),
    /// No match; insert as a new event
    Create {
        /// Closest pair that fell just short of the threshold, for logging
        near_miss: Option<(EventId, f64)>,
    },
}

/// Deduplication functions bound to one set of thresholds.
#[derive(Debug, Clone, Default)]
pub struct DedupEngine {
    config: DedupConfig,
}

impl DedupEngine {
    /// Create an engine with the given thresholds and weights.
    #[must_use]
    pub fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    /// Thresholds in use.
    #[must_use]
    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// Content hash of `event`.
    #[must_use]
    pub fn hash(&self, event: &RawEventData) -> String {
        generate_event_hash(event)
    }

    /// Qualifying matches, best first.
    #[must_use]
    pub fn find_similar(&self, candidate: &RawEventData, existing: &[StoredEvent]) -> Vec<SimilarityMatch> {
        find_similar_events(candidate, existing, &self.config)
    }

    /// Decide what to do with `candidate`.
    ///
    /// `hash` is the candidate's content hash. Exact duplicates win over fuzzy
    /// matches; among fuzzy matches the highest score wins.
    #[must_use]
    pub fn decide<S: AsRef<str>>(
        &self,
        candidate: &RawEventData,
        hash: &str,
        known_hashes: &[S],
        existing: &[StoredEvent],
    ) -> DedupDecision {
        if is_exact_duplicate(hash, known_hashes) {
            return DedupDecision::ExactDuplicate;
        }

        match self.find_similar(candidate, existing).into_iter().next() {
            Some(best) => DedupDecision::Merge(best),
            None => DedupDecision::Create {
                near_miss: matcher::closest_near_miss(candidate, existing, &self.config),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventide_core::SourceId;

    fn raw(title: &str) -> RawEventData {
        let mut event = RawEventData::new(SourceId::new("city-arts").expect("valid id"), title);
        event.start_time = Some("2025-06-14T19:00:00Z".to_string());
        event.location = Some("Main Hall".to_string());
        event
    }

    #[test]
    fn test_decide_exact_duplicate() {
        let engine = DedupEngine::default();
        let candidate = raw("Jazz Night");
        let hash = engine.hash(&candidate);
        let decision = engine.decide(&candidate, &hash, &[hash.clone()], &[]);
        assert_eq!(decision, DedupDecision::ExactDuplicate);
    }

    #[test]
    fn test_decide_merge_picks_best() {
        let engine = DedupEngine::default();
        let weaker = StoredEvent::new(raw("Jazz Nights Live"), None);
        let stronger = StoredEvent::new(raw("Jazz Night!"), None);
        let candidate = raw("Jazz Night");
        let hash = engine.hash(&candidate);

        match engine.decide::<String>(&candidate, &hash, &[], &[weaker, stronger.clone()]) {
            DedupDecision::Merge(best) => assert_eq!(best.event_id, stronger.id),
            other => panic!("expected merge, got {other:?}"),
        }
    }

    #[test]
    fn test_decide_create() {
        let engine = DedupEngine::default();
        let mut other = raw("Summer Food Festival");
        other.start_time = Some("2025-07-01T12:00:00Z".to_string());
        other.location = Some("Riverside Park".to_string());
        let candidate = raw("Jazz Night");
        let hash = engine.hash(&candidate);

        let decision = engine.decide::<String>(&candidate, &hash, &[], &[StoredEvent::new(other, None)]);
        assert_eq!(decision, DedupDecision::Create { near_miss: None });
    }
}
