//! Connection pool setup with reconnect backoff.
//!
//! The pool is opened once at process start. A database that is briefly
//! unreachable (file on a network mount, locked by a backup) is retried with
//! exponential backoff before startup gives up.

use crate::error::{DatabaseError, Result};
use eventide_core::DatabaseConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// In-memory database path.
pub const MEMORY_PATH: &str = ":memory:";

/// Pool sizing and retry settings, usually taken from [`DatabaseConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Maximum pooled connections
    pub max_connections: u32,
    /// Attempts before giving up
    pub attempts: u32,
    /// First retry delay; doubles per attempt
    pub backoff: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self::from(&DatabaseConfig::default())
    }
}

impl From<&DatabaseConfig> for ConnectOptions {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            max_connections: config.max_connections.max(1),
            attempts: config.connect_attempts.max(1),
            backoff: Duration::from_millis(config.connect_backoff_ms),
        }
    }
}

/// Delay before retry number `attempt` (1-based).
pub(crate) fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1).min(16)))
}

/// Open a connection pool at `path`, retrying with exponential backoff.
///
/// `:memory:` opens a private in-memory database held by a single
/// connection, so every query sees the same data.
pub async fn connect(path: impl AsRef<Path>, options: ConnectOptions) -> Result<Pool<Sqlite>> {
    let path_str = path
        .as_ref()
        .to_str()
        .ok_or_else(|| DatabaseError::Open("invalid database path: not valid UTF-8".to_string()))?;
    let in_memory = path_str == MEMORY_PATH;

    let mut connect_options = SqliteConnectOptions::from_str(path_str)
        .map_err(|e| DatabaseError::Open(format!("invalid connection string: {e}")))?
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));
    if !in_memory {
        if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| DatabaseError::Open(format!("create {}: {e}", parent.display())))?;
        }
        connect_options = connect_options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
    }

    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(options.max_connections)
    };

    let mut attempt = 0;
    loop {
        attempt += 1;
        match pool_options
            .clone()
            .connect_with(connect_options.clone())
            .await
        {
            Ok(pool) => {
                tracing::info!(path = %path_str, attempt, "database pool opened");
                return Ok(pool);
            }
            Err(e) if attempt < options.attempts => {
                let delay = backoff_delay(options.backoff, attempt);
                tracing::warn!(
                    path = %path_str,
                    attempt,
                    retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "database connection failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return Err(DatabaseError::Unreachable {
                    attempts: attempt,
                    last_error: e.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(1000));
        assert_eq!(backoff_delay(base, 4), Duration::from_millis(4000));
    }

    #[test]
    fn test_options_from_config() {
        let config = DatabaseConfig {
            max_connections: 0,
            connect_attempts: 0,
            ..DatabaseConfig::default()
        };
        let options = ConnectOptions::from(&config);
        assert_eq!(options.max_connections, 1);
        assert_eq!(options.attempts, 1);
    }

    #[tokio::test]
    async fn test_memory_pool_shares_one_database() {
        let pool = connect(MEMORY_PATH, ConnectOptions::default())
            .await
            .expect("open pool");

        sqlx::query("CREATE TABLE t (x INTEGER)")
            .execute(&pool)
            .await
            .expect("create table");
        sqlx::query("INSERT INTO t (x) VALUES (1)")
            .execute(&pool)
            .await
            .expect("insert");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM t")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_unreachable_after_attempts() {
        let options = ConnectOptions {
            max_connections: 1,
            attempts: 2,
            backoff: Duration::from_millis(1),
        };
        let result = connect("/proc/eventide-nonexistent/dir/db.sqlite", options).await;
        assert!(result.is_err());
    }
}
