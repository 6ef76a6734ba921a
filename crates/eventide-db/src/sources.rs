//! Source persistence.

use crate::error::{DatabaseError, Result};
use crate::timestamp;
use async_trait::async_trait;
use eventide_core::SourceId;
use eventide_sources::{EventSource, SourceError, SourceStore, SourceType};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};

/// Source store backed by the `sources` table. Scrape settings are kept as a
/// JSON document.
#[derive(Debug, Clone)]
pub struct SqliteSourceStore {
    pool: Pool<Sqlite>,
}

impl SqliteSourceStore {
    /// Wrap an existing pool.
    #[must_use]
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    async fn select_all(&self) -> Result<Vec<EventSource>> {
        let rows = sqlx::query(
            "SELECT id, name, url, source_type, category, is_active, scrape_config, error_count,
                    last_scraped_at, created_at, updated_at
             FROM sources ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(source_from_row).collect()
    }

    async fn upsert(&self, source: &EventSource) -> Result<()> {
        let scrape_config = serde_json::to_string(&source.scrape_config)?;

        sqlx::query(
            "INSERT INTO sources (id, name, url, source_type, category, is_active, scrape_config,
                error_count, last_scraped_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                url = excluded.url,
                source_type = excluded.source_type,
                category = excluded.category,
                is_active = excluded.is_active,
                scrape_config = excluded.scrape_config,
                error_count = excluded.error_count,
                last_scraped_at = excluded.last_scraped_at,
                updated_at = excluded.updated_at",
        )
        .bind(source.id.as_str())
        .bind(&source.name)
        .bind(&source.url)
        .bind(source.source_type.as_str())
        .bind(&source.category)
        .bind(source.is_active)
        .bind(scrape_config)
        .bind(i64::from(source.error_count))
        .bind(timestamp::encode_opt(source.last_scraped_at.as_ref()))
        .bind(timestamp::encode(&source.created_at))
        .bind(timestamp::encode(&source.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, id: &SourceId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sources WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn source_from_row(row: &SqliteRow) -> Result<EventSource> {
    let id: String = row.try_get("id")?;
    let id = SourceId::new(id).map_err(|e| DatabaseError::Decode(e.to_string()))?;

    let source_type: String = row.try_get("source_type")?;
    let source_type = SourceType::parse(&source_type).ok_or_else(|| {
        DatabaseError::Decode(format!("invalid source_type '{source_type}' for source {id}"))
    })?;

    let scrape_config: String = row.try_get("scrape_config")?;
    let error_count: i64 = row.try_get("error_count")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(EventSource {
        id,
        name: row.try_get("name")?,
        url: row.try_get("url")?,
        source_type,
        category: row.try_get("category")?,
        is_active: row.try_get("is_active")?,
        scrape_config: serde_json::from_str(&scrape_config)?,
        error_count: u32::try_from(error_count).unwrap_or(0),
        last_scraped_at: timestamp::decode_opt(row.try_get("last_scraped_at")?)?,
        created_at: timestamp::decode(&created_at)?,
        updated_at: timestamp::decode(&updated_at)?,
    })
}

#[async_trait]
impl SourceStore for SqliteSourceStore {
    async fn load_all(&self) -> std::result::Result<Vec<EventSource>, SourceError> {
        Ok(self.select_all().await?)
    }

    async fn save(&self, source: &EventSource) -> std::result::Result<(), SourceError> {
        Ok(self.upsert(source).await?)
    }

    async fn delete(&self, id: &SourceId) -> std::result::Result<bool, SourceError> {
        Ok(self.remove(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use eventide_sources::{SourceDefinition, SourceRegistry, StrategyKind};
    use std::sync::Arc;

    fn definition(id: &str) -> SourceDefinition {
        toml::from_str(&format!(
            r#"
[source]
id = "{id}"
name = "Source {id}"
url = "https://{id}.example.org/events"
source_type = "website"
category = "music"

[scrape]
strategies = ["headless-browser"]
wait_for = ".event"

[scrape.selectors]
event_container = ".event"
title = "h2"
"#
        ))
        .expect("parse definition")
    }

    fn source(id: &str) -> EventSource {
        EventSource::from_definition(definition(id))
    }

    async fn store() -> SqliteSourceStore {
        let db = Database::in_memory().await.expect("open database");
        db.run_migrations().await.expect("run migrations");
        db.source_store()
    }

    #[tokio::test]
    async fn test_save_and_load_round_trips_scrape_config() {
        let store = store().await;
        store.save(&source("city-arts")).await.expect("save");

        let loaded = store.load_all().await.expect("load");
        assert_eq!(loaded.len(), 1);
        let loaded = &loaded[0];
        assert_eq!(loaded.id.as_str(), "city-arts");
        assert_eq!(loaded.category.as_deref(), Some("music"));
        assert_eq!(
            loaded.scrape_config.strategies,
            vec![StrategyKind::HeadlessBrowser]
        );
        assert_eq!(loaded.scrape_config.wait_for.as_deref(), Some(".event"));
        assert!(loaded.is_active);
    }

    #[tokio::test]
    async fn test_save_upserts() {
        let store = store().await;
        let mut src = source("city-arts");
        store.save(&src).await.expect("save");

        src.error_count = 4;
        src.is_active = false;
        store.save(&src).await.expect("save again");

        let loaded = store.load_all().await.expect("load");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].error_count, 4);
        assert!(!loaded[0].is_active);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = store().await;
        let src = source("city-arts");
        store.save(&src).await.expect("save");

        assert!(store.delete(&src.id).await.expect("delete"));
        assert!(!store.delete(&src.id).await.expect("delete again"));
    }

    #[tokio::test]
    async fn test_registry_survives_restart() {
        let db = Database::in_memory().await.expect("open database");
        db.run_migrations().await.expect("run migrations");

        let registry = SourceRegistry::new(Arc::new(db.source_store()), 5);
        registry.create(definition("city-arts")).await.expect("create");
        registry
            .record_failure(&SourceId::new("city-arts").expect("valid id"))
            .await
            .expect("record failure");

        let reloaded = SourceRegistry::new(Arc::new(db.source_store()), 5);
        assert_eq!(reloaded.initialize().await.expect("initialize"), 1);
        let src = reloaded
            .get(&SourceId::new("city-arts").expect("valid id"))
            .expect("source cached");
        assert_eq!(src.error_count, 1);
    }
}
