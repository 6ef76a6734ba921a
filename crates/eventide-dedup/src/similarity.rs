//! Per-signal similarity scores in `[0, 1]`.

use eventide_core::time::parse_event_time;

/// Lowercase, map punctuation to spaces, collapse whitespace.
fn comparison_key(input: &str) -> String {
    input
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Case- and punctuation-insensitive edit-distance similarity.
///
/// Symmetric; 1.0 for equal inputs (including two blank strings), 0.0 when
/// exactly one side is blank. Minor variations like pluralization stay
/// above 0.9.
#[must_use]
pub fn calculate_string_similarity(a: &str, b: &str) -> f64 {
    match (a.trim().is_empty(), b.trim().is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        (false, false) => {}
    }

    let a = comparison_key(a);
    let b = comparison_key(b);
    if a == b {
        return 1.0;
    }

    strsim::normalized_levenshtein(&a, &b).clamp(0.0, 1.0)
}

/// Linear time proximity: 1.0 for identical instants, falling to 0.0 at
/// `tolerance_minutes` apart and beyond.
///
/// Unparseable input on either side scores 0.0. A non-positive tolerance only
/// accepts identical instants.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn calculate_time_similarity(a: &str, b: &str, tolerance_minutes: i64) -> f64 {
    let (Some(a), Some(b)) = (parse_event_time(a), parse_event_time(b)) else {
        return 0.0;
    };

    let diff_secs = (a - b).num_seconds().unsigned_abs() as f64;
    if tolerance_minutes <= 0 {
        return if diff_secs == 0.0 { 1.0 } else { 0.0 };
    }

    let tolerance_secs = (tolerance_minutes * 60) as f64;
    (1.0 - diff_secs / tolerance_secs).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_strings() {
        assert!((calculate_string_similarity("Jazz Night", "Jazz Night") - 1.0).abs() < f64::EPSILON);
        assert!((calculate_string_similarity("Jazz Night!", "jazz  night") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_blank_strings() {
        assert!((calculate_string_similarity("", "  ") - 1.0).abs() < f64::EPSILON);
        assert!(calculate_string_similarity("", "Jazz").abs() < f64::EPSILON);
        assert!(calculate_string_similarity("Jazz", " ").abs() < f64::EPSILON);
    }

    #[test]
    fn test_pluralization_scores_high() {
        let score = calculate_string_similarity(
            "Jazz Concerts at Cultural Centre",
            "Jazz Concert at Cultural Centre",
        );
        assert!(score > 0.9, "score was {score}");
    }

    #[test]
    fn test_unrelated_titles_score_low() {
        let score = calculate_string_similarity("Summer Food Festival", "Jazz Concert at Cultural Centre");
        assert!(score < 0.3, "score was {score}");
    }

    #[test]
    fn test_string_similarity_symmetric() {
        let pairs = [
            ("Jazz Performance", "Jazz Concert at Cultural Centre"),
            ("Farmers Market", "Farmer's Market"),
            ("a", "abcdef"),
        ];
        for (a, b) in pairs {
            let ab = calculate_string_similarity(a, b);
            let ba = calculate_string_similarity(b, a);
            assert!((ab - ba).abs() < 1e-12, "{a} / {b}");
            assert!((0.0..=1.0).contains(&ab));
        }
    }

    #[test]
    fn test_time_similarity_linear() {
        let base = "2025-06-14T19:00:00Z";
        assert!((calculate_time_similarity(base, base, 120) - 1.0).abs() < f64::EPSILON);
        let half = calculate_time_similarity(base, "2025-06-14T20:00:00Z", 120);
        assert!((half - 0.5).abs() < 1e-9);
        let quarter = calculate_time_similarity("2025-06-14T19:30:00Z", base, 120);
        assert!((quarter - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_time_similarity_at_and_beyond_tolerance() {
        let base = "2025-06-14T19:00:00Z";
        assert!(calculate_time_similarity(base, "2025-06-14T21:00:00Z", 120).abs() < f64::EPSILON);
        assert!(calculate_time_similarity(base, "2025-06-15T19:00:00Z", 120).abs() < f64::EPSILON);
    }

    #[test]
    fn test_time_similarity_invalid_input() {
        assert!(calculate_time_similarity("tonight", "2025-06-14T19:00:00Z", 120).abs() < f64::EPSILON);
        assert!(calculate_time_similarity("", "", 120).abs() < f64::EPSILON);
    }

    #[test]
    fn test_time_similarity_across_offsets() {
        let score = calculate_time_similarity("2025-06-14T21:00:00+02:00", "2025-06-14T19:00:00Z", 120);
        assert!((score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_tolerance() {
        let base = "2025-06-14T19:00:00Z";
        assert!((calculate_time_similarity(base, base, 0) - 1.0).abs() < f64::EPSILON);
        assert!(calculate_time_similarity(base, "2025-06-14T19:01:00Z", 0).abs() < f64::EPSILON);
    }
}
