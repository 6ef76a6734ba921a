//! In-memory source registry backed by a persistent store.
//!
//! Sources are loaded once by [`SourceRegistry::initialize`] and cached by id.
//! Every mutation is written through to the store first and then applied to
//! the cache, so a failed write leaves the cache untouched. Mutations are
//! serialized; reads never wait on the store.

use crate::{
    definition::{EventSource, SourceDefinition, SourceType, SourceUpdate},
    error::{Result, SourceError},
    loader::SourceLoader,
    store::SourceStore,
};
use chrono::Utc;
use eventide_core::SourceId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Listing filter; `None` fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceFilter {
    /// Match on active state
    pub active: Option<bool>,
    /// Match on source type
    pub source_type: Option<SourceType>,
}

impl SourceFilter {
    /// Only active sources.
    #[must_use]
    pub fn active() -> Self {
        Self {
            active: Some(true),
            source_type: None,
        }
    }

    fn matches(&self, source: &EventSource) -> bool {
        self.active.map_or(true, |a| source.is_active == a)
            && self.source_type.map_or(true, |t| source.source_type == t)
    }
}

/// Result of recording a scrape failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    /// Error count after the failure
    pub error_count: u32,
    /// Whether this failure deactivated the source
    pub deactivated: bool,
}

/// Counts from a definition import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Sources that did not exist before
    pub created: usize,
    /// Existing sources whose configuration was replaced
    pub updated: usize,
}

/// Cache of source records keyed by id.
#[derive(Clone)]
pub struct SourceRegistry {
    sources: Arc<RwLock<HashMap<SourceId, EventSource>>>,
    store: Arc<dyn SourceStore>,
    write_lock: Arc<Mutex<()>>,
    error_threshold: u32,
}

impl SourceRegistry {
    /// Create an empty registry over `store`.
    ///
    /// Sources whose error count exceeds `error_threshold` are deactivated.
    #[must_use]
    pub fn new(store: Arc<dyn SourceStore>, error_threshold: u32) -> Self {
        Self {
            sources: Arc::new(RwLock::new(HashMap::new())),
            store,
            write_lock: Arc::new(Mutex::new(())),
            error_threshold,
        }
    }

    /// Configured auto-deactivation threshold.
    #[must_use]
    pub fn error_threshold(&self) -> u32 {
        self.error_threshold
    }

    fn read_cache(&self) -> RwLockReadGuard<'_, HashMap<SourceId, EventSource>> {
        self.sources.read().expect("acquire read lock on sources")
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, HashMap<SourceId, EventSource>> {
        self.sources.write().expect("acquire write lock on sources")
    }

    /// Replace the cache with the store's contents.
    ///
    /// # Errors
    /// Returns error if the store cannot be read.
    pub async fn initialize(&self) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let sources = self.store.load_all().await?;

        let mut cache = self.write_cache();
        cache.clear();
        for source in sources {
            cache.insert(source.id.clone(), source);
        }

        info!(count = cache.len(), "loaded sources");
        Ok(cache.len())
    }

    /// Get a source by ID.
    ///
    /// # Errors
    /// Returns error if the source is not found.
    pub fn get(&self, id: &SourceId) -> Result<EventSource> {
        self.read_cache()
            .get(id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound {
                source_id: id.to_string(),
            })
    }

    /// Sources matching `filter`, ordered by id.
    #[must_use]
    pub fn list(&self, filter: &SourceFilter) -> Vec<EventSource> {
        let mut sources: Vec<EventSource> = self
            .read_cache()
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        sources.sort_by(|a, b| a.id.cmp(&b.id));
        sources
    }

    /// Active sources, ordered by id.
    #[must_use]
    pub fn active_sources(&self) -> Vec<EventSource> {
        self.list(&SourceFilter::active())
    }

    /// Active sources that have a fallback chain, ordered by id.
    ///
    /// Batch scrapes and fan-outs draw from this list; manual sources never
    /// appear in it.
    #[must_use]
    pub fn scrapable_sources(&self) -> Vec<EventSource> {
        self.active_sources()
            .into_iter()
            .filter(EventSource::is_scraped)
            .collect()
    }

    /// Number of cached sources.
    #[must_use]
    pub fn count(&self) -> usize {
        self.read_cache().len()
    }

    /// Register a new source.
    ///
    /// # Errors
    /// Returns error if the definition is invalid, the id is taken, or the
    /// store rejects the write.
    pub async fn create(&self, definition: SourceDefinition) -> Result<EventSource> {
        definition.validate()?;
        let _guard = self.write_lock.lock().await;

        let exists = self.read_cache().contains_key(definition.id());
        if exists {
            return Err(SourceError::AlreadyExists {
                source_id: definition.id().to_string(),
            });
        }

        let source = EventSource::from_definition(definition);
        self.store.save(&source).await?;
        self.write_cache().insert(source.id.clone(), source.clone());

        info!(source_id = %source.id, source_type = source.source_type.as_str(), "created source");
        Ok(source)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    /// Returns error if the source is missing, the result is invalid, or the
    /// store rejects the write.
    pub async fn update(&self, id: &SourceId, update: SourceUpdate) -> Result<EventSource> {
        let source = self.mutate(id, |source| update.apply_to(source)).await?;
        debug!(source_id = %id, "updated source");
        Ok(source)
    }

    /// Remove a source.
    ///
    /// # Errors
    /// Returns error if the source is missing or the store rejects the delete.
    pub async fn delete(&self, id: &SourceId) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let exists = self.read_cache().contains_key(id);
        if !exists {
            return Err(SourceError::NotFound {
                source_id: id.to_string(),
            });
        }

        self.store.delete(id).await?;
        self.write_cache().remove(id);

        info!(source_id = %id, "deleted source");
        Ok(())
    }

    /// Mark a source active.
    pub async fn activate(&self, id: &SourceId) -> Result<EventSource> {
        let source = self.mutate(id, |s| s.is_active = true).await?;
        info!(source_id = %id, "activated source");
        Ok(source)
    }

    /// Mark a source inactive.
    pub async fn deactivate(&self, id: &SourceId) -> Result<EventSource> {
        let source = self.mutate(id, |s| s.is_active = false).await?;
        info!(source_id = %id, "deactivated source");
        Ok(source)
    }

    /// Clear a source's accumulated error count. Does not reactivate it.
    pub async fn reset_error_count(&self, id: &SourceId) -> Result<EventSource> {
        let source = self.mutate(id, |s| s.error_count = 0).await?;
        info!(source_id = %id, "reset source error count");
        Ok(source)
    }

    /// Count a scrape failure, deactivating the source once its error count
    /// exceeds the threshold.
    pub async fn record_failure(&self, id: &SourceId) -> Result<FailureOutcome> {
        let threshold = self.error_threshold;
        let mut deactivated = false;

        let source = self
            .mutate(id, |s| {
                s.error_count = s.error_count.saturating_add(1);
                if s.is_active && s.error_count > threshold {
                    s.is_active = false;
                    deactivated = true;
                }
            })
            .await?;

        if deactivated {
            warn!(
                source_id = %id,
                error_count = source.error_count,
                threshold,
                "source exceeded error threshold, deactivated"
            );
        } else {
            debug!(source_id = %id, error_count = source.error_count, "recorded source failure");
        }

        Ok(FailureOutcome {
            error_count: source.error_count,
            deactivated,
        })
    }

    /// Stamp a successful scrape.
    pub async fn record_success(&self, id: &SourceId) -> Result<EventSource> {
        self.mutate(id, |s| s.last_scraped_at = Some(Utc::now())).await
    }

    /// Create or refresh sources from definition files.
    ///
    /// Existing sources keep their active state, error count and history;
    /// only their configuration is replaced.
    pub async fn import(&self, loader: &SourceLoader) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();

        for definition in loader.load_all()? {
            let id = definition.id().clone();
            let exists = self.read_cache().contains_key(&id);
            if exists {
                let update = SourceUpdate {
                    name: Some(definition.source.name),
                    url: Some(definition.source.url),
                    source_type: Some(definition.source.source_type),
                    category: definition.source.category,
                    scrape_config: Some(definition.scrape),
                };
                self.update(&id, update).await?;
                summary.updated += 1;
            } else {
                self.create(definition).await?;
                summary.created += 1;
            }
        }

        info!(created = summary.created, updated = summary.updated, "imported source definitions");
        Ok(summary)
    }

    async fn mutate<F>(&self, id: &SourceId, apply: F) -> Result<EventSource>
    where
        F: FnOnce(&mut EventSource) + Send,
    {
        let _guard = self.write_lock.lock().await;

        let mut source = self.get(id)?;
        apply(&mut source);
        source.updated_at = Utc::now();
        source.validate()?;

        self.store.save(&source).await?;
        self.write_cache().insert(id.clone(), source.clone());

        Ok(source)
    }
}
