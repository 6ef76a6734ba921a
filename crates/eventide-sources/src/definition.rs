//! Source definition types and structures.
//!
//! An [`EventSource`] is a configured external origin of event listings. Its
//! [`ScrapeConfig`] tells the extraction strategies where the data lives on
//! the page (or in the API response) and how politely to fetch it.

use crate::error::{Result, SourceError};
use chrono::{DateTime, Utc};
use eventide_core::SourceId;
use serde::{Deserialize, Serialize};

/// How a source publishes its listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// HTML pages scraped with CSS selectors
    Website,
    /// JSON endpoint mapped with JSON pointers
    Api,
    /// Entered by hand; never scraped
    Manual,
}

impl SourceType {
    /// Lowercase name as stored and serialized.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Website => "website",
            Self::Api => "api",
            Self::Manual => "manual",
        }
    }

    /// Parse the lowercase name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "website" => Some(Self::Website),
            "api" => Some(Self::Api),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// One extraction strategy in a fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Plain HTTP fetch parsed in-process
    StaticHtml,
    /// Local headless Chromium
    HeadlessBrowser,
    /// Remote rendering service
    ManagedService,
    /// JSON API mapped with pointers
    JsonApi,
}

impl StrategyKind {
    /// Kebab-case name used in logs and configuration.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StaticHtml => "static-html",
            Self::HeadlessBrowser => "headless-browser",
            Self::ManagedService => "managed-service",
            Self::JsonApi => "json-api",
        }
    }
}

/// CSS selectors locating listing fields on a page.
///
/// Field selectors are evaluated relative to each `event_container` match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selectors {
    /// One element per event
    pub event_container: String,
    /// Event title
    pub title: String,
    /// Description text
    #[serde(default)]
    pub description: Option<String>,
    /// Start time element
    #[serde(default)]
    pub start_time: Option<String>,
    /// End time element
    #[serde(default)]
    pub end_time: Option<String>,
    /// Venue element
    #[serde(default)]
    pub location: Option<String>,
    /// Price element
    #[serde(default)]
    pub price: Option<String>,
    /// `<img>` element; its `src` is used
    #[serde(default)]
    pub image: Option<String>,
    /// `<a>` element; its `href` is used as the listing URL
    #[serde(default)]
    pub link: Option<String>,
    /// Attribute holding a machine-readable date on time elements (e.g. `datetime`)
    #[serde(default)]
    pub datetime_attribute: Option<String>,
}

/// JSON pointers mapping an API response to event fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMapping {
    /// Pointer to the array of items (empty string for a top-level array)
    #[serde(default)]
    pub items_path: String,
    /// Pointer within an item to the title
    pub title: String,
    /// Pointer to the description
    #[serde(default)]
    pub description: Option<String>,
    /// Pointer to the start time
    #[serde(default)]
    pub start_time: Option<String>,
    /// Pointer to the end time
    #[serde(default)]
    pub end_time: Option<String>,
    /// Pointer to the venue
    #[serde(default)]
    pub location: Option<String>,
    /// Pointer to the price
    #[serde(default)]
    pub price: Option<String>,
    /// Pointer to the image URL
    #[serde(default)]
    pub image: Option<String>,
    /// Pointer to the listing URL
    #[serde(default)]
    pub link: Option<String>,
}

/// Minimum spacing between requests to one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    /// Milliseconds between consecutive requests
    pub min_delay_ms: u64,
}

/// Per-source extraction settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Page selectors (website sources)
    pub selectors: Option<Selectors>,
    /// Selector to wait for before reading a rendered page
    pub wait_for: Option<String>,
    /// Extra settle time after load, in milliseconds
    pub wait_ms: Option<u64>,
    /// Per-strategy timeout override, in seconds
    pub timeout_secs: Option<u64>,
    /// Request spacing override
    pub rate_limit: Option<RateLimit>,
    /// User agents to rotate through; empty uses the global list
    pub user_agents: Vec<String>,
    /// Explicit fallback chain; empty uses the default for the source type
    pub strategies: Vec<StrategyKind>,
    /// Response mapping (API sources)
    pub api: Option<ApiMapping>,
}

impl ScrapeConfig {
    /// Ordered fallback chain for a source of `source_type`.
    ///
    /// Manual sources get an empty chain.
    #[must_use]
    pub fn strategy_chain(&self, source_type: SourceType) -> Vec<StrategyKind> {
        if !self.strategies.is_empty() {
            return self.strategies.clone();
        }

        match source_type {
            SourceType::Website => vec![
                StrategyKind::StaticHtml,
                StrategyKind::HeadlessBrowser,
                StrategyKind::ManagedService,
            ],
            SourceType::Api => vec![StrategyKind::JsonApi],
            SourceType::Manual => Vec::new(),
        }
    }
}

/// A configured origin of event listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSource {
    /// Unique source identifier (e.g. "city-arts")
    pub id: SourceId,
    /// Human-readable name
    pub name: String,
    /// Listing page or API endpoint
    pub url: String,
    /// How the source publishes data
    pub source_type: SourceType,
    /// Category shared by this source's events (bounds dedup candidate windows)
    pub category: Option<String>,
    /// Inactive sources are never scraped
    pub is_active: bool,
    /// Extraction settings
    pub scrape_config: ScrapeConfig,
    /// Consecutive failures since the last manual reset
    pub error_count: u32,
    /// Last successful scrape
    pub last_scraped_at: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl EventSource {
    /// Build a fresh, active source from a definition.
    #[must_use]
    pub fn from_definition(definition: SourceDefinition) -> Self {
        let now = Utc::now();
        Self {
            id: definition.source.id,
            name: definition.source.name,
            url: definition.source.url,
            source_type: definition.source.source_type,
            category: definition.source.category,
            is_active: definition.source.active,
            scrape_config: definition.scrape,
            error_count: 0,
            last_scraped_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the source has any extraction strategy. Manual sources with
    /// no explicit strategies do not.
    #[must_use]
    pub fn is_scraped(&self) -> bool {
        !self.scrape_config.strategy_chain(self.source_type).is_empty()
    }

    /// Validate name and URL.
    ///
    /// Selector problems are not checked here; they surface as configuration
    /// errors when the source is scraped.
    pub fn validate(&self) -> Result<()> {
        validate_fields(&self.id, &self.name, &self.url)
    }
}

fn validate_fields(id: &SourceId, name: &str, url: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(SourceError::ValidationError {
            source_id: id.to_string(),
            reason: "source name cannot be empty".to_string(),
        });
    }

    match url::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        Ok(parsed) => Err(SourceError::ValidationError {
            source_id: id.to_string(),
            reason: format!("source URL must be http or https, got {}", parsed.scheme()),
        }),
        Err(e) => Err(SourceError::ValidationError {
            source_id: id.to_string(),
            reason: format!("invalid source URL: {e}"),
        }),
    }
}

/// Source metadata as written in a definition file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Unique source identifier
    pub id: SourceId,
    /// Human-readable name
    pub name: String,
    /// Listing page or API endpoint
    pub url: String,
    /// How the source publishes data
    pub source_type: SourceType,
    /// Optional category
    #[serde(default)]
    pub category: Option<String>,
    /// Whether the source starts active
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Complete source definition as loaded from TOML.
///
/// ```toml
/// [source]
/// id = "city-arts"
/// name = "City Arts Calendar"
/// url = "https://arts.example.org/events"
/// source_type = "website"
/// category = "music"
///
/// [scrape.selectors]
/// event_container = ".event-card"
/// title = "h3"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDefinition {
    /// Identity and lifecycle
    pub source: SourceMetadata,
    /// Extraction settings
    #[serde(default)]
    pub scrape: ScrapeConfig,
}

impl SourceDefinition {
    /// Get the source ID.
    #[must_use]
    pub fn id(&self) -> &SourceId {
        &self.source.id
    }

    /// Validate name and URL.
    pub fn validate(&self) -> Result<()> {
        validate_fields(&self.source.id, &self.source.name, &self.source.url)
    }
}

/// Partial update applied by [`SourceRegistry::update`](crate::SourceRegistry::update).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceUpdate {
    /// New name
    pub name: Option<String>,
    /// New URL
    pub url: Option<String>,
    /// New source type
    pub source_type: Option<SourceType>,
    /// New category
    pub category: Option<String>,
    /// Replacement scrape settings
    pub scrape_config: Option<ScrapeConfig>,
}

impl SourceUpdate {
    /// Apply the set fields to `source`.
    pub fn apply_to(self, source: &mut EventSource) {
        if let Some(name) = self.name {
            source.name = name;
        }
        if let Some(url) = self.url {
            source.url = url;
        }
        if let Some(source_type) = self.source_type {
            source.source_type = source_type;
        }
        if let Some(category) = self.category {
            source.category = Some(category);
        }
        if let Some(scrape_config) = self.scrape_config {
            source.scrape_config = scrape_config;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEBSITE_TOML: &str = r#"
[source]
id = "city-arts"
name = "City Arts Calendar"
url = "https://arts.example.org/events"
source_type = "website"
category = "music"

[scrape]
wait_for = ".event-card"
timeout_secs = 20
user_agents = ["EventideBot/1.0"]

[scrape.rate_limit]
min_delay_ms = 2000

[scrape.selectors]
event_container = ".event-card"
title = "h3"
start_time = "time"
datetime_attribute = "datetime"
link = "a.more"
"#;

    const API_TOML: &str = r#"
[source]
id = "venue-feed"
name = "Venue Feed"
url = "https://api.example.org/v1/events"
source_type = "api"
active = false

[scrape.api]
items_path = "/data/events"
title = "/name"
start_time = "/starts_at"
"#;

    #[test]
    fn test_parse_website_definition() {
        let def: SourceDefinition = toml::from_str(WEBSITE_TOML).expect("parse website toml");
        assert_eq!(def.id().as_str(), "city-arts");
        assert_eq!(def.source.source_type, SourceType::Website);
        assert!(def.source.active);

        let selectors = def.scrape.selectors.as_ref().expect("selectors present");
        assert_eq!(selectors.event_container, ".event-card");
        assert_eq!(selectors.datetime_attribute.as_deref(), Some("datetime"));
        assert_eq!(def.scrape.rate_limit, Some(RateLimit { min_delay_ms: 2000 }));
        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_parse_api_definition() {
        let def: SourceDefinition = toml::from_str(API_TOML).expect("parse api toml");
        assert_eq!(def.source.source_type, SourceType::Api);
        assert!(!def.source.active);
        let api = def.scrape.api.as_ref().expect("api mapping");
        assert_eq!(api.items_path, "/data/events");
        assert_eq!(api.title, "/name");
    }

    #[test]
    fn test_default_strategy_chains() {
        let config = ScrapeConfig::default();
        assert_eq!(
            config.strategy_chain(SourceType::Website),
            vec![
                StrategyKind::StaticHtml,
                StrategyKind::HeadlessBrowser,
                StrategyKind::ManagedService
            ]
        );
        assert_eq!(config.strategy_chain(SourceType::Api), vec![StrategyKind::JsonApi]);
        assert!(config.strategy_chain(SourceType::Manual).is_empty());
    }

    #[test]
    fn test_explicit_strategy_chain_wins() {
        let config = ScrapeConfig {
            strategies: vec![StrategyKind::ManagedService],
            ..ScrapeConfig::default()
        };
        assert_eq!(
            config.strategy_chain(SourceType::Website),
            vec![StrategyKind::ManagedService]
        );
    }

    #[test]
    fn test_manual_sources_are_not_scraped() {
        let mut def: SourceDefinition = toml::from_str(WEBSITE_TOML).expect("parse");
        def.source.source_type = SourceType::Manual;
        def.scrape.strategies.clear();
        let mut source = EventSource::from_definition(def);
        assert!(!source.is_scraped());

        source.scrape_config.strategies = vec![StrategyKind::StaticHtml];
        assert!(source.is_scraped());
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        let mut def: SourceDefinition = toml::from_str(WEBSITE_TOML).expect("parse");
        def.source.name = "  ".to_string();
        assert!(matches!(
            def.validate(),
            Err(SourceError::ValidationError { .. })
        ));

        let mut def: SourceDefinition = toml::from_str(WEBSITE_TOML).expect("parse");
        def.source.url = "ftp://arts.example.org".to_string();
        assert!(def.validate().is_err());

        def.source.url = "not a url".to_string();
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_source_type_round_trip_names() {
        for kind in [SourceType::Website, SourceType::Api, SourceType::Manual] {
            assert_eq!(SourceType::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(SourceType::parse("rss"), None);
    }

    #[test]
    fn test_update_applies_only_set_fields() {
        let def: SourceDefinition = toml::from_str(WEBSITE_TOML).expect("parse");
        let mut source = EventSource::from_definition(def);
        SourceUpdate {
            name: Some("City Arts".to_string()),
            ..SourceUpdate::default()
        }
        .apply_to(&mut source);

        assert_eq!(source.name, "City Arts");
        assert_eq!(source.url, "https://arts.example.org/events");
        assert_eq!(source.category.as_deref(), Some("music"));
    }
}
