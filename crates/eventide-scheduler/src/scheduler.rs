//! Recurring and on-demand job scheduling.

use crate::error::Result;
use crate::jobs::{EnqueueRequest, JobKind, JobPayload, JobPriority, JobRecord};
use crate::queue::JobQueue;
use eventide_core::SourceId;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Enqueues scrape work on a timer and on request.
#[derive(Clone)]
pub struct Scheduler {
    queue: Arc<dyn JobQueue>,
    interval: Duration,
}

impl Scheduler {
    /// Scheduler enqueuing a scrape-all job every `interval_minutes`.
    #[must_use]
    pub fn new(queue: Arc<dyn JobQueue>, interval_minutes: u32) -> Self {
        Self {
            queue,
            interval: Duration::from_secs(u64::from(interval_minutes.max(1)) * 60),
        }
    }

    /// Enqueue a high-priority scrape of one source.
    pub async fn scrape_now(&self, source_id: SourceId) -> Result<JobRecord> {
        let job = self
            .queue
            .enqueue(EnqueueRequest::new(
                JobPayload::ScrapeSource { source_id },
                JobPriority::High,
            ))
            .await?;
        info!(job_id = %job.id, "enqueued scrape-now job");
        Ok(job)
    }

    /// Enqueue a scrape of every active source.
    pub async fn scrape_all(&self, priority: JobPriority) -> Result<JobRecord> {
        self.queue
            .enqueue(EnqueueRequest::new(JobPayload::ScrapeAll, priority))
            .await
    }

    /// Enqueue a health check.
    pub async fn health_check(&self) -> Result<JobRecord> {
        self.queue
            .enqueue(EnqueueRequest::new(JobPayload::HealthCheck, JobPriority::Low))
            .await
    }

    /// Enqueue a bulk fan-out that becomes runnable `delay_minutes` from now.
    pub async fn schedule_bulk(&self, delay_minutes: u32) -> Result<JobRecord> {
        let request = EnqueueRequest::new(
            JobPayload::BulkSchedule { delay_minutes },
            JobPriority::Normal,
        )
        .delayed_by(chrono::Duration::minutes(i64::from(delay_minutes)));

        let job = self.queue.enqueue(request).await?;
        info!(job_id = %job.id, delay_minutes, "scheduled bulk scrape");
        Ok(job)
    }

    /// Enqueue the recurring scrape-all unless one is already pending.
    ///
    /// Returns `None` when skipped.
    pub async fn tick(&self) -> Result<Option<JobRecord>> {
        if self.queue.queue_depth(JobKind::ScrapeAll).await? > 0 {
            debug!("scrape-all already pending, skipping tick");
            return Ok(None);
        }
        self.scrape_all(JobPriority::Normal).await.map(Some)
    }

    /// Tick every interval until `shutdown` fires. The first tick comes one
    /// interval after start.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = self.interval.as_secs(), "scheduler started");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(Some(job)) => info!(job_id = %job.id, "enqueued scheduled scrape-all"),
                        Ok(None) => {}
                        Err(e) => error!(error = %e, "failed to enqueue scheduled scrape-all"),
                    }
                }
            }
        }

        info!("scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobStatus;
    use crate::queue::MemoryJobQueue;

    #[tokio::test]
    async fn test_scrape_now_is_high_priority() {
        let queue = Arc::new(MemoryJobQueue::new());
        let scheduler = Scheduler::new(queue.clone(), 15);
        scheduler.tick().await.expect("tick");
        let manual = scheduler
            .scrape_now(SourceId::new("city-arts").expect("valid id"))
            .await
            .expect("scrape now");

        let first = queue.dequeue().await.expect("dequeue").expect("job");
        assert_eq!(first.id, manual.id);
        assert_eq!(first.priority, JobPriority::High);
    }

    #[tokio::test]
    async fn test_tick_skips_when_pending() {
        let queue = Arc::new(MemoryJobQueue::new());
        let scheduler = Scheduler::new(queue.clone(), 15);

        assert!(scheduler.tick().await.expect("tick").is_some());
        assert!(scheduler.tick().await.expect("tick").is_none());

        let job = queue.dequeue().await.expect("dequeue").expect("job");
        queue.complete(&job.id, None).await.expect("complete");
        assert!(scheduler.tick().await.expect("tick").is_some());
    }

    #[tokio::test]
    async fn test_schedule_bulk_is_delayed() {
        let queue = Arc::new(MemoryJobQueue::new());
        let scheduler = Scheduler::new(queue.clone(), 15);

        let job = scheduler.schedule_bulk(30).await.expect("schedule");
        assert_eq!(job.payload, JobPayload::BulkSchedule { delay_minutes: 30 });
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.available_at >= job.created_at + chrono::Duration::minutes(29));
        assert!(queue.dequeue().await.expect("dequeue").is_none());
    }
}
