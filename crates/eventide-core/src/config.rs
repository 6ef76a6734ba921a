//! Configuration management for Eventide.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration.
///
/// This is loaded from `~/.config/eventide/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Queue/event database connection
    pub database: DatabaseConfig,
    /// Worker pool settings
    pub worker: WorkerConfig,
    /// Job retry policy
    pub retry: RetryConfig,
    /// Recurring scheduler settings
    pub scheduler: SchedulerConfig,
    /// Deduplication thresholds and weights
    pub dedup: DedupConfig,
    /// Extraction behavior
    pub scraping: ScrapingConfig,
    /// Source registry settings
    pub sources: SourcesConfig,
    /// Log output
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from the default location, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }

        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides, then validate.
    ///
    /// Supports the following environment variables:
    /// - `EVENTIDE_DATABASE_PATH`: Override the database file
    /// - `EVENTIDE_CONCURRENCY`: Override worker concurrency
    /// - `EVENTIDE_SCHEDULER_INTERVAL_MINUTES`: Override the scrape-all interval
    /// - `EVENTIDE_MANAGED_SERVICE_URL` / `EVENTIDE_MANAGED_SERVICE_TOKEN`: Managed extraction service
    /// - `EVENTIDE_LOG_JSON`: Emit JSON logs (true/false)
    pub fn load_with_env(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::load()?,
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("EVENTIDE_DATABASE_PATH") {
            tracing::debug!("Override database.path from env: {}", val);
            self.database.path = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("EVENTIDE_CONCURRENCY") {
            if let Ok(concurrency) = val.parse() {
                self.worker.concurrency = concurrency;
                tracing::debug!("Override worker.concurrency from env: {}", concurrency);
            }
        }

        if let Ok(val) = std::env::var("EVENTIDE_SCHEDULER_INTERVAL_MINUTES") {
            if let Ok(minutes) = val.parse() {
                self.scheduler.interval_minutes = minutes;
                tracing::debug!("Override scheduler.interval_minutes from env: {}", minutes);
            }
        }

        if let Ok(val) = std::env::var("EVENTIDE_MANAGED_SERVICE_URL") {
            self.scraping.managed_service_url = Some(val);
        }

        if let Ok(val) = std::env::var("EVENTIDE_MANAGED_SERVICE_TOKEN") {
            self.scraping.managed_service_token = Some(val);
        }

        if let Ok(val) = std::env::var("EVENTIDE_LOG_JSON") {
            if let Ok(json) = val.parse() {
                self.logging.json = json;
            }
        }
    }

    /// Reject values the rest of the system cannot work with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.worker.concurrency == 0 {
            return Err(invalid("worker.concurrency", "must be at least 1"));
        }
        if self.retry.attempts == 0 {
            return Err(invalid("retry.attempts", "must be at least 1"));
        }
        if self.scheduler.interval_minutes == 0 {
            return Err(invalid("scheduler.interval_minutes", "must be at least 1"));
        }
        if self.scraping.strategy_timeout_secs == 0 {
            return Err(invalid("scraping.strategy_timeout_secs", "must be at least 1"));
        }
        self.dedup.validate()
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/eventide/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("org", "eventide", "eventide").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/eventide`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("org", "eventide", "eventide").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }

    /// Resolve the database file, defaulting to `<data_dir>/eventide.db`.
    pub fn database_path(&self) -> ConfigResult<PathBuf> {
        match &self.database.path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("eventide.db")),
        }
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Queue/event database connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file (`:memory:` for an in-memory database)
    pub path: Option<PathBuf>,
    /// Connection pool size
    pub max_connections: u32,
    /// Connection attempts before giving up at startup
    pub connect_attempts: u32,
    /// First reconnect delay in milliseconds (doubles per attempt)
    pub connect_backoff_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: 5,
            connect_attempts: 5,
            connect_backoff_ms: 500,
        }
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Jobs executed in parallel
    pub concurrency: usize,
    /// Overall per-job timeout in seconds
    pub job_timeout_secs: u64,
    /// Idle poll interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            job_timeout_secs: 600,
            poll_interval_ms: 1000,
        }
    }
}

/// Job retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per job (including the first)
    pub attempts: u32,
    /// Delay before the first retry in milliseconds (doubles per attempt)
    pub backoff_base_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_base_ms: 2000,
        }
    }
}

/// Recurring scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Whether the recurring scrape-all timer runs
    pub enabled: bool,
    /// Minutes between scrape-all jobs
    pub interval_minutes: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_minutes: 15,
        }
    }
}

/// Deduplication thresholds and signal weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Title similarity at which a title match qualifies on its own
    pub title_similarity_threshold: f64,
    /// Location similarity below which the location signal counts as zero
    pub location_similarity_threshold: f64,
    /// Start-time distance at which time similarity reaches zero
    pub time_tolerance_minutes: i64,
    /// Weighted score at or above which two records are the same event
    pub combined_similarity_threshold: f64,
    /// Weight of the title signal
    pub title_weight: f64,
    /// Weight of the time signal
    pub time_weight: f64,
    /// Weight of the location signal
    pub location_weight: f64,
    /// Hours on either side of a record's start time searched for candidates
    pub candidate_window_hours: i64,
    /// Scores this close below the threshold are logged as near misses
    pub near_miss_margin: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            title_similarity_threshold: 0.9,
            location_similarity_threshold: 0.7,
            time_tolerance_minutes: 120,
            combined_similarity_threshold: 0.6,
            title_weight: 0.4,
            time_weight: 0.3,
            location_weight: 0.3,
            candidate_window_hours: 24,
            near_miss_margin: 0.05,
        }
    }
}

impl DedupConfig {
    /// Check thresholds are ratios and weights are usable.
    pub fn validate(&self) -> ConfigResult<()> {
        for (field, value) in [
            ("dedup.title_similarity_threshold", self.title_similarity_threshold),
            ("dedup.location_similarity_threshold", self.location_similarity_threshold),
            ("dedup.combined_similarity_threshold", self.combined_similarity_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, "must be between 0 and 1"));
            }
        }

        if self.time_tolerance_minutes <= 0 {
            return Err(invalid("dedup.time_tolerance_minutes", "must be positive"));
        }

        if self.candidate_window_hours <= 0 {
            return Err(invalid("dedup.candidate_window_hours", "must be positive"));
        }

        let weights = [self.title_weight, self.time_weight, self.location_weight];
        if weights.iter().any(|w| *w < 0.0) || weights.iter().sum::<f64>() <= 0.0 {
            return Err(invalid(
                "dedup weights",
                "must be non-negative and sum to more than zero",
            ));
        }

        Ok(())
    }
}

/// Extraction behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    /// Per-strategy timeout in seconds
    pub strategy_timeout_secs: u64,
    /// Minimum delay between requests to one host in milliseconds
    pub min_request_delay_ms: u64,
    /// Issue a conditional request before scraping
    pub freshness_check: bool,
    /// User agents rotated across requests
    pub user_agents: Vec<String>,
    /// Managed rendering service base URL
    pub managed_service_url: Option<String>,
    /// Managed rendering service token (never written to disk)
    #[serde(skip_serializing)]
    pub managed_service_token: Option<String>,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            strategy_timeout_secs: 30,
            min_request_delay_ms: 1000,
            freshness_check: true,
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15".to_string(),
                "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0".to_string(),
            ],
            managed_service_url: None,
            managed_service_token: None,
        }
    }
}

/// Source registry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Errors a source may accumulate before it is deactivated
    pub error_threshold: u32,
    /// Directory of TOML source definitions imported at startup
    pub definitions_dir: Option<PathBuf>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            error_threshold: 5,
            definitions_dir: None,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,eventide=debug".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.worker.concurrency, 3);
        assert_eq!(config.retry.attempts, 3);
        assert_eq!(config.scheduler.interval_minutes, 15);
        assert_eq!(config.scraping.strategy_timeout_secs, 30);
        assert_eq!(config.sources.error_threshold, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[worker]"));
        assert!(toml_str.contains("[dedup]"));
        assert!(toml_str.contains("[scraping]"));

        let parsed: AppConfig = toml::from_str(&toml_str).expect("parse serialized config");
        assert_eq!(parsed.worker.concurrency, config.worker.concurrency);
    }

    #[test]
    fn test_config_load_from_file() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");

        let mut config = AppConfig::default();
        config.worker.concurrency = 8;
        config.dedup.time_tolerance_minutes = 90;

        let contents = toml::to_string_pretty(&config).expect("serialize config");
        fs::write(&config_path, contents).expect("write config file");

        let loaded = AppConfig::load_from(&config_path).expect("load config");
        assert_eq!(loaded.worker.concurrency, 8);
        assert_eq!(loaded.dedup.time_tolerance_minutes, 90);
    }

    #[test]
    fn test_load_from_missing_file() {
        let tmp = TempDir::new().expect("create temp dir");
        let result = AppConfig::load_from(&tmp.path().join("nope.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[worker]
concurrency = 6

[dedup]
combined_similarity_threshold = 0.75
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.worker.concurrency, 6);
        assert!((config.dedup.combined_similarity_threshold - 0.75).abs() < f64::EPSILON);
        // These should be defaults
        assert_eq!(config.retry.attempts, 3);
        assert_eq!(config.dedup.time_tolerance_minutes, 120);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.worker.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.dedup.combined_similarity_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.dedup.title_weight = 0.0;
        config.dedup.time_weight = 0.0;
        config.dedup.location_weight = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_token_is_not_serialized() {
        let mut config = AppConfig::default();
        config.scraping.managed_service_token = Some("secret".to_string());
        let toml_str = toml::to_string_pretty(&config).expect("serialize config");
        assert!(!toml_str.contains("secret"));
    }
}
