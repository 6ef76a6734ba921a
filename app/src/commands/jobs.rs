//! Job management commands.

use super::parse_source_id;
use crate::error::CommandError;
use crate::state::AppState;
use eventide_core::JobId;
use eventide_scheduler::{
    EnqueueRequest, JobListQuery, JobPage, JobPayload, JobPriority, JobRecord, JobStatus,
};
use serde_json::json;

/// Enqueue a scrape of one active source.
///
/// Manual requests normally run at high priority so they overtake scheduled
/// batches.
pub async fn scrape_now(
    state: &AppState,
    source_id: &str,
    high_priority: bool,
) -> Result<JobRecord, CommandError> {
    let id = parse_source_id(source_id)?;
    let source = state.registry.get(&id)?;
    if !source.is_active {
        return Err(CommandError::with_details(
            "SOURCE_INACTIVE",
            format!("Source {id} is inactive"),
            json!({ "source_id": id, "error_count": source.error_count }),
        ));
    }
    if !source.is_scraped() {
        return Err(CommandError::with_details(
            "SOURCE_NOT_SCRAPED",
            format!("Source {id} has no extraction strategy"),
            json!({ "source_id": id, "source_type": source.source_type }),
        ));
    }

    if high_priority {
        return Ok(state.scheduler.scrape_now(id).await?);
    }

    Ok(state
        .queue
        .enqueue(EnqueueRequest::new(
            JobPayload::ScrapeSource { source_id: id },
            JobPriority::Normal,
        ))
        .await?)
}

/// Enqueue a scrape of every active source.
pub async fn scrape_all(state: &AppState) -> Result<JobRecord, CommandError> {
    Ok(state.scheduler.scrape_all(JobPriority::High).await?)
}

/// Enqueue a health check.
pub async fn health_check(state: &AppState) -> Result<JobRecord, CommandError> {
    Ok(state.scheduler.health_check().await?)
}

/// Enqueue a bulk fan-out `delay_minutes` from now.
pub async fn schedule_bulk(state: &AppState, delay_minutes: u32) -> Result<JobRecord, CommandError> {
    Ok(state.scheduler.schedule_bulk(delay_minutes).await?)
}

/// Page through jobs, newest first.
pub async fn list_jobs(
    state: &AppState,
    status: Option<JobStatus>,
    page: u32,
    per_page: u32,
) -> Result<JobPage, CommandError> {
    if per_page == 0 || per_page > 200 {
        return Err(CommandError::new(
            "INVALID_PAGE_SIZE",
            "per_page must be between 1 and 200",
        ));
    }
    let query = JobListQuery {
        status,
        page: page.max(1),
        per_page,
    };
    Ok(state.queue.list(query).await?)
}

/// Get one job.
pub async fn get_job(state: &AppState, job_id: &str) -> Result<JobRecord, CommandError> {
    let id = JobId::from_string(job_id);
    state.queue.get(&id).await?.ok_or_else(|| {
        CommandError::with_details(
            "JOB_NOT_FOUND",
            format!("Job not found: {job_id}"),
            json!({ "job_id": job_id }),
        )
    })
}

/// Requeue a permanently failed job with a fresh attempt budget.
pub async fn retry_job(state: &AppState, job_id: &str) -> Result<JobRecord, CommandError> {
    Ok(state.queue.retry(&JobId::from_string(job_id)).await?)
}
