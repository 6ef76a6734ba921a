//! Content hashing for exact-duplicate detection.

use crate::normalize::normalize_event_data;
use eventide_core::RawEventData;
use sha2::{Digest, Sha256};

/// Separates hashed fields so `("ab", "c")` and `("a", "bc")` differ.
const FIELD_SEPARATOR: char = '\u{1f}';

/// SHA-256 hex digest (64 chars) over normalized, case-folded title,
/// description, start time and location.
///
/// Missing fields hash as empty strings. The source URL and id are not part
/// of the hash, so the same listing syndicated on two sites collides.
#[must_use]
pub fn generate_event_hash(event: &RawEventData) -> String {
    let normalized = normalize_event_data(event);

    let fields = [
        normalized.title.to_lowercase(),
        normalized.description.unwrap_or_default().to_lowercase(),
        normalized.start_time.unwrap_or_default(),
        normalized.location.unwrap_or_default().to_lowercase(),
    ];

    let mut hasher = Sha256::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            hasher.update(FIELD_SEPARATOR.to_string().as_bytes());
        }
        hasher.update(field.as_bytes());
    }

    hex::encode(hasher.finalize())
}

/// Membership test against hashes already known to the store.
#[must_use]
pub fn is_exact_duplicate<S: AsRef<str>>(hash: &str, known_hashes: &[S]) -> bool {
    known_hashes.iter().any(|known| known.as_ref() == hash)
}
