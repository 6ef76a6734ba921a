//! Field normalization applied before hashing and comparison.

use eventide_core::time::canonicalize;
use eventide_core::RawEventData;

/// Trim and collapse runs of internal whitespace to single spaces.
#[must_use]
pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_text(value: Option<&String>) -> Option<String> {
    value
        .map(|v| collapse_whitespace(v))
        .filter(|v| !v.is_empty())
}

fn normalize_url(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn normalize_time(value: Option<&String>) -> Option<String> {
    value.map(|v| canonicalize(v)).filter(|v| !v.is_empty())
}

/// Normalize a record's fields.
///
/// Text fields are trimmed with internal whitespace collapsed, blank optional
/// fields become `None`, and parseable dates become canonical UTC strings.
/// Case is preserved; case folding happens only when hashing. Idempotent.
#[must_use]
pub fn normalize_event_data(event: &RawEventData) -> RawEventData {
    RawEventData {
        title: collapse_whitespace(&event.title),
        description: normalize_text(event.description.as_ref()),
        start_time: normalize_time(event.start_time.as_ref()),
        end_time: normalize_time(event.end_time.as_ref()),
        location: normalize_text(event.location.as_ref()),
        price: normalize_text(event.price.as_ref()),
        image_url: normalize_url(event.image_url.as_ref()),
        source_url: normalize_url(event.source_url.as_ref()),
        source_id: event.source_id.clone(),
        extracted_at: event.extracted_at,
        scrape_hash: event.scrape_hash.clone(),
    }
}
