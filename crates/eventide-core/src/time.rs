//! Date parsing for scraped event times.
//!
//! Listings arrive with every date format imaginable. Everything we can parse
//! is converted to UTC and rendered in one canonical RFC 3339 form so that
//! hashing and comparison see the same string for the same instant.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Naive formats tried after RFC 3339 / RFC 2822. Naive values are taken as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
    "%d %B %Y %H:%M",
    "%B %d, %Y %H:%M",
];

const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d %B %Y", "%B %d, %Y"];

/// Parse a scraped date string into UTC.
///
/// Returns `None` for empty or unrecognized input; never panics.
#[must_use]
pub fn parse_event_time(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(input) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Some(naive.and_utc());
        }
    }

    for format in NAIVE_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(input, format) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }

    None
}

/// Render a timestamp in the canonical form (`2025-06-14T19:00:00Z`).
#[must_use]
pub fn to_canonical(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse and re-render a date string canonically.
///
/// Unparseable input is returned trimmed and otherwise untouched, which keeps
/// the conversion idempotent.
#[must_use]
pub fn canonicalize(input: &str) -> String {
    parse_event_time(input).map_or_else(|| input.trim().to_string(), |dt| to_canonical(&dt))
}
