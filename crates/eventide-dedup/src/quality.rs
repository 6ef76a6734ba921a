//! Completeness and informativeness scoring.

use eventide_core::time::parse_event_time;
use eventide_core::RawEventData;

fn present(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn is_http_url(value: &str) -> bool {
    url::Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

fn title_points(title: &str) -> u8 {
    let title = title.trim();
    if title.is_empty() {
        return 0;
    }
    let chars = title.chars().count();
    let mut points = 5;
    if chars >= 10 {
        points += 5;
    }
    if chars >= 20 {
        points += 5;
    }
    if title.split_whitespace().count() >= 3 {
        points += 5;
    }
    points
}

fn description_points(description: Option<&str>) -> u8 {
    let Some(description) = description else {
        return 0;
    };
    let chars = description.chars().count();
    let mut points = 5;
    if chars >= 50 {
        points += 10;
    }
    if chars >= 150 {
        points += 10;
    }
    points
}

/// Score a record from 0 to 100.
///
/// | field        | points |
/// |--------------|--------|
/// | title        | up to 20 (presence, length, word count) |
/// | description  | up to 25 (presence, length) |
/// | start time   | 10 if parseable |
/// | end time     | 5 if parseable |
/// | location     | 10 |
/// | price        | 10 |
/// | image URL    | 10 if http(s) |
/// | source URL   | 10 if http(s) |
///
/// Adding a field never lowers the score.
#[must_use]
pub fn calculate_event_quality_score(event: &RawEventData) -> u8 {
    let mut score = title_points(&event.title);
    score += description_points(present(event.description.as_ref()));

    if present(event.start_time.as_ref()).and_then(parse_event_time).is_some() {
        score += 10;
    }
    if present(event.end_time.as_ref()).and_then(parse_event_time).is_some() {
        score += 5;
    }
    if present(event.location.as_ref()).is_some() {
        score += 10;
    }
    if present(event.price.as_ref()).is_some() {
        score += 10;
    }
    if present(event.image_url.as_ref()).is_some_and(is_http_url) {
        score += 10;
    }
    if present(event.source_url.as_ref()).is_some_and(is_http_url) {
        score += 10;
    }

    score.min(100)
}
