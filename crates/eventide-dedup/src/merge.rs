//! Field-level merge of a fresh extraction into a stored record.

use eventide_core::RawEventData;

fn pick(existing: Option<&String>, incoming: Option<&String>) -> Option<String> {
    incoming
        .filter(|v| !v.trim().is_empty())
        .or(existing)
        .cloned()
}

/// Merge `incoming` into `existing`.
///
/// Incoming values win when present and non-blank; blanks never erase data.
/// The originating source and the content hash stay with the existing record,
/// so the listing that was stored first keeps matching exactly on later
/// scrapes. `extracted_at` takes the later of the two. Idempotent: merging a
/// record with itself returns it unchanged.
#[must_use]
pub fn merge_event_data(existing: &RawEventData, incoming: &RawEventData) -> RawEventData {
    let title = if incoming.title.trim().is_empty() {
        existing.title.clone()
    } else {
        incoming.title.clone()
    };

    RawEventData {
        title,
        description: pick(existing.description.as_ref(), incoming.description.as_ref()),
        start_time: pick(existing.start_time.as_ref(), incoming.start_time.as_ref()),
        end_time: pick(existing.end_time.as_ref(), incoming.end_time.as_ref()),
        location: pick(existing.location.as_ref(), incoming.location.as_ref()),
        price: pick(existing.price.as_ref(), incoming.price.as_ref()),
        image_url: pick(existing.image_url.as_ref(), incoming.image_url.as_ref()),
        source_url: pick(existing.source_url.as_ref(), incoming.source_url.as_ref()),
        source_id: existing.source_id.clone(),
        extracted_at: existing.extracted_at.max(incoming.extracted_at),
        scrape_hash: existing.scrape_hash.clone(),
    }
}

/// Whether merging `incoming` would change any stored field of `existing`.
///
/// A newer `extracted_at` alone is not a change.
#[must_use]
pub fn merge_changes(existing: &RawEventData, incoming: &RawEventData) -> bool {
    let merged = RawEventData {
        extracted_at: existing.extracted_at,
        ..merge_event_data(existing, incoming)
    };
    merged != *existing
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use eventide_core::SourceId;

    fn existing() -> RawEventData {
        let mut event = RawEventData::new(SourceId::new("city-arts").expect("valid id"), "Jazz Night");
        event.description = Some("Live jazz".to_string());
        event.location = Some("Main Hall".to_string());
        event.price = Some("$15".to_string());
        event.scrape_hash = Some("a".repeat(64));
        event
    }

    #[test]
    fn test_incoming_wins_when_present() {
        let existing = existing();
        let mut incoming = RawEventData::new(SourceId::new("jazz-weekly").expect("valid id"), "Jazz Night (Late Show)");
        incoming.price = Some("$20".to_string());
        incoming.image_url = Some("https://example.com/poster.jpg".to_string());

        let merged = merge_event_data(&existing, &incoming);
        assert_eq!(merged.title, "Jazz Night (Late Show)");
        assert_eq!(merged.price.as_deref(), Some("$20"));
        assert_eq!(merged.image_url.as_deref(), Some("https://example.com/poster.jpg"));
        assert_eq!(merged.description.as_deref(), Some("Live jazz"));
        assert_eq!(merged.location.as_deref(), Some("Main Hall"));
        assert_eq!(merged.source_id, existing.source_id);
        assert_eq!(merged.scrape_hash, existing.scrape_hash);
    }

    #[test]
    fn test_blank_incoming_does_not_erase() {
        let existing = existing();
        let mut incoming = RawEventData::new(existing.source_id.clone(), "  ");
        incoming.description = Some("   ".to_string());

        let merged = merge_event_data(&existing, &incoming);
        assert_eq!(merged.title, "Jazz Night");
        assert_eq!(merged.description.as_deref(), Some("Live jazz"));
    }

    #[test]
    fn test_extracted_at_takes_latest() {
        let existing = existing();
        let mut incoming = existing.clone();
        incoming.extracted_at = existing.extracted_at + Duration::hours(2);
        assert_eq!(merge_event_data(&existing, &incoming).extracted_at, incoming.extracted_at);
        assert_eq!(merge_event_data(&incoming, &existing).extracted_at, incoming.extracted_at);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let event = existing();
        assert_eq!(merge_event_data(&event, &event), event);
    }

    #[test]
    fn test_merge_changes_ignores_repeat_variants() {
        let existing = existing();
        let mut variant = RawEventData::new(SourceId::new("jazz-weekly").expect("valid id"), "Jazz Night (Late Show)");
        variant.extracted_at = existing.extracted_at + Duration::hours(1);
        assert!(merge_changes(&existing, &variant));

        let stored = merge_event_data(&existing, &variant);
        let mut again = variant.clone();
        again.extracted_at = variant.extracted_at + Duration::hours(6);
        assert!(!merge_changes(&stored, &again));

        let blank = RawEventData::new(existing.source_id.clone(), "");
        assert!(!merge_changes(&existing, &blank));
    }
}
