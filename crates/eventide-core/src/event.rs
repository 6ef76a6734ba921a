//! Event records as they flow from extraction to storage.

use crate::time::parse_event_time;
use crate::types::{EventId, SourceId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// An event listing as produced by an extraction strategy.
///
/// Transient: it lives only between extraction and the create/merge decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEventData {
    /// Event title
    pub title: String,
    /// Free-text description
    pub description: Option<String>,
    /// Start time as scraped (any parseable date string)
    pub start_time: Option<String>,
    /// End time as scraped
    pub end_time: Option<String>,
    /// Venue or address
    pub location: Option<String>,
    /// Price text ("Free", "$15", ...)
    pub price: Option<String>,
    /// Poster or hero image
    pub image_url: Option<String>,
    /// Canonical listing URL
    pub source_url: Option<String>,
    /// Source the record was extracted from
    pub source_id: SourceId,
    /// When the record was extracted
    pub extracted_at: DateTime<Utc>,
    /// Content hash over the normalized identifying fields
    pub scrape_hash: Option<String>,
}

impl RawEventData {
    /// Create a record with only a title, extracted now.
    #[must_use]
    pub fn new(source_id: SourceId, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            start_time: None,
            end_time: None,
            location: None,
            price: None,
            image_url: None,
            source_url: None,
            source_id,
            extracted_at: Utc::now(),
            scrape_hash: None,
        }
    }

    /// Parsed start time, if the scraped string is understood.
    #[must_use]
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start_time.as_deref().and_then(parse_event_time)
    }
}

/// An event as held by the event store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Store-assigned identifier
    pub id: EventId,
    /// Category of the originating source (bounds dedup candidate windows)
    pub category: Option<String>,
    /// Current field values
    pub data: RawEventData,
    /// First insertion time
    pub created_at: DateTime<Utc>,
    /// Last merge time
    pub updated_at: DateTime<Utc>,
}

impl StoredEvent {
    /// Wrap freshly deduplicated data as a new stored event.
    #[must_use]
    pub fn new(data: RawEventData, category: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: EventId::generate(),
            category,
            data,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Half-open time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Inclusive lower bound
    pub start: DateTime<Utc>,
    /// Exclusive upper bound
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Window of `hours` on either side of `center`.
    #[must_use]
    pub fn around(center: DateTime<Utc>, hours: i64) -> Self {
        Self {
            start: center - Duration::hours(hours),
            end: center + Duration::hours(hours),
        }
    }

    /// Whether `instant` lies inside the window.
    #[must_use]
    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        *instant >= self.start && *instant < self.end
    }
}
