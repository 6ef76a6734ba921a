//! Job execution: maps each job kind onto the orchestrator, the registry or
//! the queue itself.

use async_trait::async_trait;
use chrono::Utc;
use eventide_core::{JobId, SourceId};
use eventide_db::{Database, RunStatus, ScrapeRun};
use eventide_scheduler::{
    EnqueueRequest, JobFailure, JobHandler, JobPayload, JobPriority, JobQueue, JobRecord,
    JobStatus, QueueCounts,
};
use eventide_scraper::{ScrapeError, ScrapeJobResult, ScrapeOrchestrator};
use eventide_sources::{SourceFilter, SourceRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// A source whose error count is at or above half the deactivation threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradedSource {
    /// Source id
    pub source_id: SourceId,
    /// Accumulated errors
    pub error_count: u32,
    /// Whether it is still scraped
    pub is_active: bool,
}

/// Output of a health-check job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Database answered a trivial query
    pub database_reachable: bool,
    /// Jobs per state
    pub queue: QueueCounts,
    /// Sources being scraped
    pub active_sources: usize,
    /// Deactivated sources
    pub inactive_sources: usize,
    /// Sources close to or past the error threshold
    pub degraded_sources: Vec<DegradedSource>,
}

/// Translate a scrape error into the worker pool's retry vocabulary.
#[must_use]
pub fn job_failure(err: &ScrapeError) -> JobFailure {
    match err {
        ScrapeError::RateLimited { retry_after } => JobFailure::RateLimited {
            retry_after: *retry_after,
            message: err.to_string(),
        },
        e if e.is_retryable() => JobFailure::Retryable(e.to_string()),
        e => JobFailure::Permanent(e.to_string()),
    }
}

fn run_record(result: &ScrapeJobResult) -> ScrapeRun {
    let status = match (result.status, result.not_modified) {
        (JobStatus::Completed, true) => RunStatus::NotModified,
        (JobStatus::Completed, false) => RunStatus::Success,
        _ => RunStatus::Failed,
    };
    let mut run = ScrapeRun::new(result.source_id.clone(), status, result.started_at);
    run.job_id = result.job_id.clone();
    run.strategy = result.strategy.map(|s| s.as_str().to_string());
    run.events_found = result.events_found;
    run.events_created = result.events_created;
    run.events_updated = result.events_updated;
    run.events_skipped = result.events_skipped;
    run.duration_ms = result.duration_ms();
    run.error_message = result.error_message.clone();
    run.finished_at = result.completed_at;
    run
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, JobFailure> {
    serde_json::to_value(value).map_err(|e| JobFailure::Permanent(format!("serialize job result: {e}")))
}

/// Executes every [`JobPayload`] variant.
pub struct EventideJobHandler {
    orchestrator: Arc<ScrapeOrchestrator>,
    registry: Arc<SourceRegistry>,
    queue: Arc<dyn JobQueue>,
    db: Database,
}

impl EventideJobHandler {
    /// Create a handler.
    #[must_use]
    pub fn new(
        orchestrator: Arc<ScrapeOrchestrator>,
        registry: Arc<SourceRegistry>,
        queue: Arc<dyn JobQueue>,
        db: Database,
    ) -> Self {
        Self {
            orchestrator,
            registry,
            queue,
            db,
        }
    }

    async fn record(&self, result: &ScrapeJobResult) {
        if let Err(e) = self.db.record_scrape_run(&run_record(result)).await {
            warn!(source_id = %result.source_id, error = %e, "failed to record scrape run");
        }
    }

    async fn scrape_source(&self, job_id: &JobId, source_id: &SourceId) -> Result<Value, JobFailure> {
        let started_at = Utc::now();
        match self
            .orchestrator
            .scrape_source(source_id, Some(job_id.clone()))
            .await
        {
            Ok(result) => {
                self.record(&result).await;
                to_json(&result)
            }
            Err(e) => {
                let failed = ScrapeJobResult::failed(Some(job_id.clone()), source_id.clone(), started_at, &e);
                self.record(&failed).await;
                Err(job_failure(&e))
            }
        }
    }

    async fn scrape_all(&self, job_id: &JobId) -> Result<Value, JobFailure> {
        let summary = self.orchestrator.scrape_all(Some(job_id.clone())).await;
        for result in &summary.results {
            self.record(result).await;
        }
        if let Err(e) = self.queue.set_progress(job_id, 100).await {
            warn!(job_id = %job_id, error = %e, "failed to record progress");
        }
        to_json(&summary)
    }

    /// Build the health report served by health-check jobs.
    pub async fn health_report(&self) -> Result<HealthReport, JobFailure> {
        let database_reachable = match self.db.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "database unreachable during health check");
                false
            }
        };

        let queue = self
            .queue
            .counts()
            .await
            .map_err(|e| JobFailure::Retryable(format!("read queue counts: {e}")))?;

        let sources = self.registry.list(&SourceFilter::default());
        let threshold = self.registry.error_threshold();
        let active_sources = sources.iter().filter(|s| s.is_active).count();

        let degraded_sources = sources
            .iter()
            .filter(|s| s.error_count > 0 && s.error_count.saturating_mul(2) >= threshold)
            .map(|s| DegradedSource {
                source_id: s.id.clone(),
                error_count: s.error_count,
                is_active: s.is_active,
            })
            .collect::<Vec<_>>();

        if !degraded_sources.is_empty() {
            warn!(count = degraded_sources.len(), threshold, "sources approaching error threshold");
        }

        Ok(HealthReport {
            database_reachable,
            queue,
            active_sources,
            inactive_sources: sources.len() - active_sources,
            degraded_sources,
        })
    }

    async fn fan_out(&self) -> Result<Value, JobFailure> {
        let mut job_ids = Vec::new();

        for source in self.registry.scrapable_sources() {
            let job = self
                .queue
                .enqueue(EnqueueRequest::new(
                    JobPayload::ScrapeSource { source_id: source.id },
                    JobPriority::Normal,
                ))
                .await
                .map_err(|e| JobFailure::Retryable(format!("enqueue scrape job: {e}")))?;
            job_ids.push(job.id);
        }

        info!(enqueued = job_ids.len(), "bulk schedule fanned out");
        Ok(serde_json::json!({ "enqueued": job_ids.len(), "job_ids": job_ids }))
    }
}

#[async_trait]
impl JobHandler for EventideJobHandler {
    async fn handle(&self, job: &JobRecord) -> Result<Value, JobFailure> {
        match &job.payload {
            JobPayload::ScrapeSource { source_id } => self.scrape_source(&job.id, source_id).await,
            JobPayload::ScrapeAll => self.scrape_all(&job.id).await,
            JobPayload::HealthCheck => {
                let report = self.health_report().await?;
                to_json(&report)
            }
            JobPayload::BulkSchedule { .. } => self.fan_out().await,
        }
    }
}
