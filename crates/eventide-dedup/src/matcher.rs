//! Weighted fuzzy matching of a candidate against stored events.

use crate::normalize::normalize_event_data;
use crate::similarity::{calculate_string_similarity, calculate_time_similarity};
use eventide_core::{DedupConfig, EventId, RawEventData, StoredEvent};
use serde::{Deserialize, Serialize};

/// Which signal drove a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    /// Title similarity alone crossed its threshold, or dominated the score
    Title,
    /// Start-time proximity dominated the score
    Time,
    /// Venue similarity dominated the score
    Location,
    /// No single signal contributed more than half of the score
    Combined,
}

/// A stored event judged to be the same real-world event as a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatch {
    /// Matched stored event
    pub event_id: EventId,
    /// Score in `[0, 1]`
    pub similarity: f64,
    /// Dominant signal
    pub match_type: MatchType,
}

/// Raw per-signal scores for one candidate/existing pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalScores {
    /// Title similarity
    pub title: f64,
    /// Time proximity (0 when either start time is missing)
    pub time: f64,
    /// Location similarity (0 when missing or below the location threshold)
    pub location: f64,
    /// Weighted combination
    pub combined: f64,
}

fn weight_sum(config: &DedupConfig) -> f64 {
    config.title_weight + config.time_weight + config.location_weight
}

/// Score one pair of records with `config`'s weights and tolerances.
///
/// Both records are normalized first. Weights are rescaled to sum to 1.
#[must_use]
pub fn score_pair(candidate: &RawEventData, existing: &RawEventData, config: &DedupConfig) -> SignalScores {
    let candidate = normalize_event_data(candidate);
    let existing = normalize_event_data(existing);

    let title = calculate_string_similarity(&candidate.title, &existing.title);

    let time = match (&candidate.start_time, &existing.start_time) {
        (Some(a), Some(b)) => calculate_time_similarity(a, b, config.time_tolerance_minutes),
        _ => 0.0,
    };

    let location = match (&candidate.location, &existing.location) {
        (Some(a), Some(b)) => {
            let score = calculate_string_similarity(a, b);
            if score >= config.location_similarity_threshold {
                score
            } else {
                0.0
            }
        }
        _ => 0.0,
    };

    let total = weight_sum(config);
    let combined = if total > 0.0 {
        (config.title_weight * title + config.time_weight * time + config.location_weight * location)
            / total
    } else {
        0.0
    };

    SignalScores {
        title,
        time,
        location,
        combined: combined.clamp(0.0, 1.0),
    }
}

fn dominant_signal(scores: &SignalScores, config: &DedupConfig) -> MatchType {
    let total = weight_sum(config);
    if total <= 0.0 || scores.combined <= 0.0 {
        return MatchType::Combined;
    }

    let contributions = [
        (MatchType::Title, config.title_weight * scores.title / total),
        (MatchType::Time, config.time_weight * scores.time / total),
        (MatchType::Location, config.location_weight * scores.location / total),
    ];

    contributions
        .into_iter()
        .find(|(_, share)| *share > scores.combined / 2.0)
        .map_or(MatchType::Combined, |(kind, _)| kind)
}

/// Classify a scored pair: `Some` if it qualifies as a duplicate.
#[must_use]
pub fn classify(scores: &SignalScores, config: &DedupConfig) -> Option<(f64, MatchType)> {
    if scores.combined >= config.combined_similarity_threshold {
        return Some((scores.combined, dominant_signal(scores, config)));
    }
    if scores.title >= config.title_similarity_threshold {
        return Some((scores.title.max(scores.combined), MatchType::Title));
    }
    None
}

/// Stored events that qualify as duplicates of `candidate`, best first.
///
/// A pair qualifies when its combined score reaches the combined threshold,
/// or when the title alone reaches the title threshold.
#[must_use]
pub fn find_similar_events(
    candidate: &RawEventData,
    existing: &[StoredEvent],
    config: &DedupConfig,
) -> Vec<SimilarityMatch> {
    let mut matches: Vec<SimilarityMatch> = existing
        .iter()
        .filter_map(|stored| {
            let scores = score_pair(candidate, &stored.data, config);
            classify(&scores, config).map(|(similarity, match_type)| SimilarityMatch {
                event_id: stored.id.clone(),
                similarity,
                match_type,
            })
        })
        .collect();

    matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    matches
}

/// Best non-qualifying pair whose combined score falls within
/// `near_miss_margin` below the threshold.
#[must_use]
pub fn closest_near_miss(
    candidate: &RawEventData,
    existing: &[StoredEvent],
    config: &DedupConfig,
) -> Option<(EventId, f64)> {
    let floor = config.combined_similarity_threshold - config.near_miss_margin;

    existing
        .iter()
        .filter_map(|stored| {
            let scores = score_pair(candidate, &stored.data, config);
            if classify(&scores, config).is_none() && scores.combined >= floor {
                Some((stored.id.clone(), scores.combined))
            } else {
                None
            }
        })
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventide_core::SourceId;

    fn raw(title: &str, start: Option<&str>, location: Option<&str>) -> RawEventData {
        let mut event = RawEventData::new(SourceId::new("city-arts").expect("valid id"), title);
        event.start_time = start.map(str::to_string);
        event.location = location.map(str::to_string);
        event
    }

    fn stored(title: &str, start: Option<&str>, location: Option<&str>) -> StoredEvent {
        StoredEvent::new(raw(title, start, location), Some("music".to_string()))
    }

    #[test]
    fn test_identical_records_match_fully() {
        let config = DedupConfig::default();
        let existing = stored("Jazz Night", Some("2025-06-14T19:00:00Z"), Some("Main Hall"));
        let candidate = existing.data.clone();

        let matches = find_similar_events(&candidate, std::slice::from_ref(&existing), &config);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].event_id, existing.id);
        assert!((matches[0].similarity - 1.0).abs() < 1e-9);
        assert_eq!(matches[0].match_type, MatchType::Combined);
    }

    #[test]
    fn test_title_only_match_qualifies() {
        let config = DedupConfig::default();
        let existing = stored("Jazz Concert at Cultural Centre", None, None);
        let candidate = raw("Jazz Concerts at Cultural Centre", None, None);

        let matches = find_similar_events(&candidate, &[existing], &config);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].match_type, MatchType::Title);
        assert!(matches[0].similarity > 0.9);
    }

    #[test]
    fn test_location_below_threshold_counts_zero() {
        let config = DedupConfig::default();
        let scores = score_pair(
            &raw("A", None, Some("Main Hall")),
            &raw("B", None, Some("Riverside Park")),
            &config,
        );
        assert!(scores.location.abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_signals_count_zero() {
        let config = DedupConfig::default();
        let scores = score_pair(
            &raw("Jazz", Some("2025-06-14T19:00:00Z"), None),
            &raw("Jazz", None, Some("Main Hall")),
            &config,
        );
        assert!(scores.time.abs() < f64::EPSILON);
        assert!(scores.location.abs() < f64::EPSILON);
        assert!((scores.combined - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_unrelated_events_do_not_match() {
        let config = DedupConfig::default();
        let existing = stored("Jazz Concert", Some("2025-06-14T19:00:00Z"), Some("Main Hall"));
        let candidate = raw("Summer Food Festival", Some("2025-06-20T12:00:00Z"), Some("Riverside Park"));
        assert!(find_similar_events(&candidate, &[existing], &config).is_empty());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut config = DedupConfig {
            title_similarity_threshold: 1.1,
            ..DedupConfig::default()
        };
        let existing = stored("Open Mic", Some("2025-06-14T19:00:00Z"), None);
        let candidate = raw("Open Mic Night", Some("2025-06-14T19:30:00Z"), None);

        let scores = score_pair(&candidate, &existing.data, &config);
        config.combined_similarity_threshold = scores.combined;
        assert!(classify(&scores, &config).is_some());

        config.combined_similarity_threshold = scores.combined + 1e-6;
        assert!(classify(&scores, &config).is_none());
    }

    #[test]
    fn test_results_sorted_descending() {
        let config = DedupConfig::default();
        let close = stored("Jazz Night", Some("2025-06-14T19:00:00Z"), Some("Main Hall"));
        let exact = stored("Jazz Night", Some("2025-06-14T19:30:00Z"), Some("Main Hall"));
        let candidate = raw("Jazz Night", Some("2025-06-14T19:30:00Z"), Some("Main Hall"));

        let matches = find_similar_events(&candidate, &[close.clone(), exact.clone()], &config);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].event_id, exact.id);
        assert_eq!(matches[1].event_id, close.id);
        assert!(matches[0].similarity >= matches[1].similarity);
    }

    #[test]
    fn test_dominant_time_signal() {
        let config = DedupConfig {
            title_weight: 0.1,
            time_weight: 0.8,
            location_weight: 0.1,
            ..DedupConfig::default()
        };
        let existing = stored("Quiz", Some("2025-06-14T19:00:00Z"), None);
        let candidate = raw("Trivia Evening", Some("2025-06-14T19:00:00Z"), None);
        let matches = find_similar_events(&candidate, &[existing], &config);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].match_type, MatchType::Time);
    }

    #[test]
    fn test_near_miss_reported() {
        let config = DedupConfig {
            combined_similarity_threshold: 0.72,
            near_miss_margin: 0.05,
            ..DedupConfig::default()
        };
        // 0.4 title + 0.3 time, no location = 0.7: below 0.72, inside the margin.
        let existing = stored("Open Mic", Some("2025-06-14T19:00:00Z"), None);
        let candidate = existing.data.clone();
        let mut relaxed = config.clone();
        relaxed.title_similarity_threshold = 1.1;

        assert!(find_similar_events(&candidate, std::slice::from_ref(&existing), &relaxed).is_empty());
        let near = closest_near_miss(&candidate, &[existing.clone()], &relaxed).expect("near miss");
        assert_eq!(near.0, existing.id);
        assert!((near.1 - 0.7).abs() < 1e-9);
    }
}
