//! Event persistence.
//!
//! [`SqliteEventStore`] is the production [`EventStore`]. Each write runs as a
//! single statement in its own transaction, so a failed write leaves nothing
//! behind.

use crate::error::{DatabaseError, Result};
use crate::timestamp;
use async_trait::async_trait;
use eventide_core::{
    DateRange, EventId, EventStore, RawEventData, SourceId, StoreError, StoreResult, StoredEvent,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};

const EVENT_COLUMNS: &str = "id, source_id, category, title, description, start_time, end_time, \
     location, price, image_url, source_url, scrape_hash, extracted_at, created_at, updated_at";

/// Event store backed by the `events` table.
#[derive(Debug, Clone)]
pub struct SqliteEventStore {
    pool: Pool<Sqlite>,
}

impl SqliteEventStore {
    /// Wrap an existing pool.
    #[must_use]
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Look up an event by id.
    pub async fn get(&self, id: &EventId) -> Result<Option<StoredEvent>> {
        let row = sqlx::query(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(event_from_row).transpose()
    }

    /// Number of stored events, optionally for one source.
    pub async fn count(&self, source_id: Option<&SourceId>) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM events WHERE (?1 IS NULL OR source_id = ?1)",
        )
        .bind(source_id.map(SourceId::as_str))
        .fetch_one(&self.pool)
        .await?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn insert(&self, event: &StoredEvent) -> Result<()> {
        let data = &event.data;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO events (id, source_id, category, title, description, start_time, end_time,
                location, price, image_url, source_url, scrape_hash, starts_at, extracted_at,
                created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(event.id.as_str())
        .bind(data.source_id.as_str())
        .bind(&event.category)
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.start_time)
        .bind(&data.end_time)
        .bind(&data.location)
        .bind(&data.price)
        .bind(&data.image_url)
        .bind(&data.source_url)
        .bind(&data.scrape_hash)
        .bind(data.start().map(|dt| timestamp::encode(&dt)))
        .bind(timestamp::encode(&data.extracted_at))
        .bind(timestamp::encode(&event.created_at))
        .bind(timestamp::encode(&event.updated_at))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn overwrite(&self, event: &StoredEvent) -> Result<()> {
        let data = &event.data;
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE events SET category = ?, title = ?, description = ?, start_time = ?,
                end_time = ?, location = ?, price = ?, image_url = ?, source_url = ?,
                scrape_hash = ?, starts_at = ?, extracted_at = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&event.category)
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.start_time)
        .bind(&data.end_time)
        .bind(&data.location)
        .bind(&data.price)
        .bind(&data.image_url)
        .bind(&data.source_url)
        .bind(&data.scrape_hash)
        .bind(data.start().map(|dt| timestamp::encode(&dt)))
        .bind(timestamp::encode(&data.extracted_at))
        .bind(timestamp::encode(&event.updated_at))
        .bind(event.id.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DatabaseError::NotFound(format!(
                "event '{}' not found",
                event.id
            )));
        }

        tx.commit().await?;
        Ok(())
    }
}

fn query_error(e: DatabaseError) -> StoreError {
    if e.is_connectivity() {
        StoreError::Unavailable(e.to_string())
    } else {
        StoreError::Query(e.to_string())
    }
}

fn event_from_row(row: &SqliteRow) -> Result<StoredEvent> {
    let source_id: String = row.try_get("source_id")?;
    let source_id = SourceId::new(source_id).map_err(|e| DatabaseError::Decode(e.to_string()))?;
    let extracted_at: String = row.try_get("extracted_at")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    let data = RawEventData {
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        location: row.try_get("location")?,
        price: row.try_get("price")?,
        image_url: row.try_get("image_url")?,
        source_url: row.try_get("source_url")?,
        source_id,
        extracted_at: timestamp::decode(&extracted_at)?,
        scrape_hash: row.try_get("scrape_hash")?,
    };

    Ok(StoredEvent {
        id: EventId::from_string(row.try_get::<String, _>("id")?),
        category: row.try_get("category")?,
        data,
        created_at: timestamp::decode(&created_at)?,
        updated_at: timestamp::decode(&updated_at)?,
    })
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn create(&self, event: &StoredEvent) -> StoreResult<()> {
        self.insert(event).await.map_err(StoreError::from)
    }

    async fn update(&self, event: &StoredEvent) -> StoreResult<()> {
        self.overwrite(event).await.map_err(StoreError::from)
    }

    async fn find_by_hash(&self, hash: &str) -> StoreResult<Option<StoredEvent>> {
        let row = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE scrape_hash = ? ORDER BY created_at LIMIT 1"
        ))
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_error(e.into()))?;

        row.as_ref()
            .map(event_from_row)
            .transpose()
            .map_err(query_error)
    }

    async fn known_hashes_in_window(&self, range: DateRange) -> StoreResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT scrape_hash FROM events
             WHERE scrape_hash IS NOT NULL AND starts_at >= ?1 AND starts_at < ?2",
        )
        .bind(timestamp::encode(&range.start))
        .bind(timestamp::encode(&range.end))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_error(e.into()))
    }

    async fn find_candidates_in_window(
        &self,
        range: DateRange,
        category: Option<&str>,
    ) -> StoreResult<Vec<StoredEvent>> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE starts_at >= ?1 AND starts_at < ?2 AND (?3 IS NULL OR category = ?3)
             ORDER BY starts_at"
        ))
        .bind(timestamp::encode(&range.start))
        .bind(timestamp::encode(&range.end))
        .bind(category)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_error(e.into()))?;

        rows.iter()
            .map(event_from_row)
            .collect::<Result<Vec<_>>>()
            .map_err(query_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use chrono::{Duration, TimeZone, Utc};

    async fn store() -> SqliteEventStore {
        let db = Database::in_memory().await.expect("open database");
        db.run_migrations().await.expect("run migrations");
        db.event_store()
    }

    fn event(source: &str, title: &str, start: &str, category: Option<&str>) -> StoredEvent {
        let mut data = RawEventData::new(SourceId::new(source).expect("valid id"), title);
        data.start_time = Some(start.to_string());
        data.scrape_hash = Some(format!("hash-{title}"));
        StoredEvent::new(data, category.map(str::to_string))
    }

    #[tokio::test]
    async fn test_create_and_find_by_hash() {
        let store = store().await;
        let stored = event("city-arts", "Jazz Night", "2026-03-09T19:00:00Z", Some("music"));
        store.create(&stored).await.expect("create");

        let found = store
            .find_by_hash("hash-Jazz Night")
            .await
            .expect("query")
            .expect("event exists");
        assert_eq!(found.id, stored.id);
        assert_eq!(found.category.as_deref(), Some("music"));
        assert_eq!(found.data.title, "Jazz Night");
        assert_eq!(found.data.start(), stored.data.start());
        assert!(store.find_by_hash("missing").await.expect("query").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_id_commits_nothing() {
        let store = store().await;
        let stored = event("city-arts", "Jazz Night", "2026-03-09T19:00:00Z", None);
        store.create(&stored).await.expect("create");

        let mut clash = event("city-arts", "Other", "2026-03-09T19:00:00Z", None);
        clash.id = stored.id.clone();
        assert!(store.create(&clash).await.is_err());
        assert_eq!(store.count(None).await.expect("count"), 1);
    }

    #[tokio::test]
    async fn test_update_overwrites_fields() {
        let store = store().await;
        let mut stored = event("city-arts", "Jazz Night", "2026-03-09T19:00:00Z", None);
        store.create(&stored).await.expect("create");

        stored.data.price = Some("$15".to_string());
        stored.updated_at = Utc::now();
        store.update(&stored).await.expect("update");

        let found = store.get(&stored.id).await.expect("get").expect("exists");
        assert_eq!(found.data.price.as_deref(), Some("$15"));
    }

    #[tokio::test]
    async fn test_update_missing_event() {
        let store = store().await;
        let stored = event("city-arts", "Ghost", "2026-03-09T19:00:00Z", None);
        assert!(matches!(
            store.update(&stored).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_candidates_respect_window_and_category() {
        let store = store().await;
        store
            .create(&event("city-arts", "Inside", "2026-03-09T20:00:00Z", Some("music")))
            .await
            .expect("create");
        store
            .create(&event("city-arts", "Other category", "2026-03-09T20:00:00Z", Some("food")))
            .await
            .expect("create");
        store
            .create(&event("city-arts", "Too late", "2026-03-12T20:00:00Z", Some("music")))
            .await
            .expect("create");

        let center = Utc.with_ymd_and_hms(2026, 3, 9, 19, 0, 0).single().expect("valid date");
        let range = DateRange::around(center, 24);

        let music = store
            .find_candidates_in_window(range, Some("music"))
            .await
            .expect("query");
        let titles: Vec<&str> = music.iter().map(|e| e.data.title.as_str()).collect();
        assert_eq!(titles, vec!["Inside"]);

        let any = store
            .find_candidates_in_window(range, None)
            .await
            .expect("query");
        assert_eq!(any.len(), 2);

        let hashes = store.known_hashes_in_window(range).await.expect("hashes");
        assert_eq!(hashes.len(), 2);

        let empty = DateRange::around(center + Duration::days(30), 1);
        assert!(store
            .find_candidates_in_window(empty, None)
            .await
            .expect("query")
            .is_empty());
    }
}
