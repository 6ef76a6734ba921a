//! Observability commands.

use super::parse_source_id;
use crate::error::CommandError;
use crate::state::AppState;
use chrono::Utc;
use eventide_db::{RollingMetrics, ScrapeRun};

/// Events scraped and created today, error rate, failed jobs in the last
/// hour and queue depth.
pub async fn rolling_metrics(state: &AppState) -> Result<RollingMetrics, CommandError> {
    Ok(state.db.rolling_metrics(Utc::now()).await?)
}

/// Most recent scrape runs, optionally for one source.
pub async fn recent_scrape_runs(
    state: &AppState,
    source_id: Option<&str>,
    limit: u32,
) -> Result<Vec<ScrapeRun>, CommandError> {
    let id = source_id.map(parse_source_id).transpose()?;
    Ok(state.db.recent_scrape_runs(id.as_ref(), limit.clamp(1, 500)).await?)
}
