//! Persistence seam for source records.

use crate::definition::EventSource;
use crate::error::Result;
use async_trait::async_trait;
use eventide_core::SourceId;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Durable storage behind the [`SourceRegistry`](crate::SourceRegistry).
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Every stored source.
    async fn load_all(&self) -> Result<Vec<EventSource>>;

    /// Insert or replace a source.
    async fn save(&self, source: &EventSource) -> Result<()>;

    /// Remove a source; `false` if it was not stored.
    async fn delete(&self, id: &SourceId) -> Result<bool>;
}

/// Non-durable store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySourceStore {
    sources: Mutex<BTreeMap<SourceId, EventSource>>,
}

impl MemorySourceStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `sources`.
    #[must_use]
    pub fn with_sources(sources: impl IntoIterator<Item = EventSource>) -> Self {
        let store = Self::new();
        {
            let mut map = store.sources.lock().expect("acquire source store lock");
            for source in sources {
                map.insert(source.id.clone(), source);
            }
        }
        store
    }
}

#[async_trait]
impl SourceStore for MemorySourceStore {
    async fn load_all(&self) -> Result<Vec<EventSource>> {
        let map = self.sources.lock().expect("acquire source store lock");
        Ok(map.values().cloned().collect())
    }

    async fn save(&self, source: &EventSource) -> Result<()> {
        let mut map = self.sources.lock().expect("acquire source store lock");
        map.insert(source.id.clone(), source.clone());
        Ok(())
    }

    async fn delete(&self, id: &SourceId) -> Result<bool> {
        let mut map = self.sources.lock().expect("acquire source store lock");
        Ok(map.remove(id).is_some())
    }
}
