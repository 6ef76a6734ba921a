//! Persistence interface for the external event store.
//!
//! The store is the single source of truth for events. Implementations must
//! make each `create`/`update` atomic: a failed write commits nothing.

use crate::error::StoreResult;
use crate::event::{DateRange, StoredEvent};
use async_trait::async_trait;

/// Create/update/query interface consumed by the scrape orchestrator.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert a new event.
    async fn create(&self, event: &StoredEvent) -> StoreResult<()>;

    /// Overwrite an existing event's fields.
    async fn update(&self, event: &StoredEvent) -> StoreResult<()>;

    /// Look up an event by its content hash.
    async fn find_by_hash(&self, hash: &str) -> StoreResult<Option<StoredEvent>>;

    /// Content hashes of every event starting inside `range`.
    ///
    /// Fetched once per scrape so dated records are checked for exact
    /// duplicates without a lookup each.
    async fn known_hashes_in_window(&self, range: DateRange) -> StoreResult<Vec<String>>;

    /// Events starting inside `range`, optionally restricted to one category.
    async fn find_candidates_in_window(
        &self,
        range: DateRange,
        category: Option<&str>,
    ) -> StoreResult<Vec<StoredEvent>>;
}
