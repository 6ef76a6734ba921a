//! Timestamp columns.
//!
//! Times are stored as fixed-width RFC 3339 UTC text so that string order is
//! time order and range queries can compare columns directly.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, SecondsFormat, Utc};

pub(crate) fn encode(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn encode_opt(dt: Option<&DateTime<Utc>>) -> Option<String> {
    dt.map(encode)
}

pub(crate) fn decode(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Decode(format!("invalid timestamp '{value}': {e}")))
}

pub(crate) fn decode_opt(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.as_deref().map(decode).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_encoding_sorts_chronologically() {
        let early = Utc.with_ymd_and_hms(2026, 3, 9, 9, 5, 0).single().expect("valid date");
        let late = Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).single().expect("valid date");
        assert!(encode(&early) < encode(&late));
        assert_eq!(encode(&early), "2026-03-09T09:05:00.000000Z");
        assert_eq!(decode(&encode(&late)).expect("decode"), late);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode("yesterday"), Err(DatabaseError::Decode(_))));
        assert_eq!(decode_opt(None).expect("decode none"), None);
    }
}
