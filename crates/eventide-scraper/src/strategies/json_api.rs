use super::{min_delay_of, user_agent_for, ExtractionStrategy};
use crate::error::{Result, ScrapeError};
use crate::http::HttpFetcher;
use async_trait::async_trait;
use chrono::Utc;
use eventide_core::{RawEventData, SourceId};
use eventide_sources::{ApiMapping, EventSource, StrategyKind};
use serde_json::Value;

/// Fetches a JSON endpoint and maps items with JSON pointers.
pub struct JsonApiStrategy {
    http: HttpFetcher,
    user_agents: Vec<String>,
}

impl JsonApiStrategy {
    /// Create the strategy over a shared fetcher.
    #[must_use]
    pub fn new(http: HttpFetcher, user_agents: Vec<String>) -> Self {
        Self { http, user_agents }
    }
}

fn scalar(item: &Value, pointer: Option<&String>) -> Option<String> {
    let value = item.pointer(pointer?)?;
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Map an API response to event records. Items without a title are skipped.
pub fn map_api_items(
    body: &Value,
    mapping: &ApiMapping,
    source_id: &SourceId,
) -> Result<Vec<RawEventData>> {
    let items = body
        .pointer(&mapping.items_path)
        .and_then(Value::as_array)
        .ok_or_else(|| {
            ScrapeError::Extraction(format!(
                "no item array at '{}' in API response",
                mapping.items_path
            ))
        })?;

    let extracted_at = Utc::now();
    let events = items
        .iter()
        .filter_map(|item| {
            let title = scalar(item, Some(&mapping.title))?;
            let mut event = RawEventData::new(source_id.clone(), title);
            event.description = scalar(item, mapping.description.as_ref());
            event.start_time = scalar(item, mapping.start_time.as_ref());
            event.end_time = scalar(item, mapping.end_time.as_ref());
            event.location = scalar(item, mapping.location.as_ref());
            event.price = scalar(item, mapping.price.as_ref());
            event.image_url = scalar(item, mapping.image.as_ref());
            event.source_url = scalar(item, mapping.link.as_ref());
            event.extracted_at = extracted_at;
            Some(event)
        })
        .collect();

    Ok(events)
}

#[async_trait]
impl ExtractionStrategy for JsonApiStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::JsonApi
    }

    async fn extract(&self, source: &EventSource) -> Result<Vec<RawEventData>> {
        let mapping = source
            .scrape_config
            .api
            .as_ref()
            .ok_or_else(|| ScrapeError::Configuration {
                source_id: source.id.clone(),
                reason: "no API mapping configured".to_string(),
            })?;

        let user_agent = user_agent_for(source, &self.user_agents);
        let body = self
            .http
            .get_json(&source.url, &user_agent, min_delay_of(source))
            .await?;

        map_api_items(&body, mapping, &source.id)
    }
}
