//! Bounded worker pool draining a [`JobQueue`].

use crate::backoff::RetryPolicy;
use crate::error::Result;
use crate::jobs::JobRecord;
use crate::queue::JobQueue;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Why a handler gave up on a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobFailure {
    /// Worth another attempt after backoff
    Retryable(String),
    /// Retrying cannot help (bad configuration, unknown source)
    Permanent(String),
    /// The target asked us to slow down; requeue without using an attempt
    RateLimited {
        /// Wait before the job becomes claimable again
        retry_after: Duration,
        /// Description for the job record
        message: String,
    },
}

impl std::fmt::Display for JobFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Retryable(msg) | Self::Permanent(msg) => f.write_str(msg),
            Self::RateLimited { message, .. } => f.write_str(message),
        }
    }
}

/// Executes claimed jobs.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Run `job`, returning a JSON summary on success.
    async fn handle(&self, job: &JobRecord) -> std::result::Result<serde_json::Value, JobFailure>;
}

/// Worker pool tuning.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPoolConfig {
    /// Jobs run concurrently
    pub concurrency: usize,
    /// Overall limit per attempt
    pub job_timeout: Duration,
    /// Idle wait between empty dequeues
    pub poll_interval: Duration,
    /// Retry budget and backoff
    pub retry: RetryPolicy,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            job_timeout: Duration::from_secs(600),
            poll_interval: Duration::from_secs(1),
            retry: RetryPolicy::default(),
        }
    }
}

/// Final disposition of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Job completed
    Completed,
    /// Job requeued with backoff
    Retrying,
    /// Job requeued without consuming an attempt
    Deferred,
    /// Job parked as failed
    Failed,
}

/// Pulls jobs from the queue and runs them on a bounded set of tasks.
pub struct WorkerPool {
    queue: Arc<dyn JobQueue>,
    handler: Arc<dyn JobHandler>,
    config: WorkerPoolConfig,
}

impl WorkerPool {
    /// Create a pool.
    #[must_use]
    pub fn new(queue: Arc<dyn JobQueue>, handler: Arc<dyn JobHandler>, config: WorkerPoolConfig) -> Self {
        Self {
            queue,
            handler,
            config,
        }
    }

    /// Run until `shutdown` fires, then wait for in-flight jobs.
    ///
    /// Jobs left active for longer than `job_timeout` are requeued first;
    /// younger active jobs may belong to another live process.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let stalled_before = Utc::now() - chrono_duration(self.config.job_timeout);
        let recovered = self.queue.recover_stalled(stalled_before).await?;
        if recovered > 0 {
            warn!(recovered, "requeued jobs left active by a previous run");
        }

        let concurrency = self.config.concurrency.max(1);
        let permits = Arc::new(Semaphore::new(concurrency));
        let mut in_flight = JoinSet::new();
        info!(concurrency, "worker pool started");

        loop {
            let permit = tokio::select! {
                () = shutdown.cancelled() => break,
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            while in_flight.try_join_next().is_some() {}

            match self.queue.dequeue().await {
                Ok(Some(job)) => {
                    let queue = Arc::clone(&self.queue);
                    let handler = Arc::clone(&self.handler);
                    let config = self.config;
                    in_flight.spawn(async move {
                        let _permit = permit;
                        Self::process(queue.as_ref(), handler.as_ref(), &config, job).await;
                    });
                }
                Ok(None) => {
                    drop(permit);
                    tokio::select! {
                        () = shutdown.cancelled() => break,
                        () = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
                Err(e) => {
                    drop(permit);
                    error!(error = %e, "failed to dequeue job");
                    tokio::select! {
                        () = shutdown.cancelled() => break,
                        () = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
            }
        }

        info!(in_flight = in_flight.len(), "worker pool stopping");
        while in_flight.join_next().await.is_some() {}
        Ok(())
    }

    /// Claim and run jobs one at a time until none are due.
    ///
    /// Returns the number of attempts made.
    pub async fn run_until_idle(&self) -> Result<usize> {
        let mut attempts = 0;
        while let Some(job) = self.queue.dequeue().await? {
            Self::process(self.queue.as_ref(), self.handler.as_ref(), &self.config, job).await;
            attempts += 1;
        }
        Ok(attempts)
    }

    /// Run one claimed job and record its outcome.
    pub async fn process(
        queue: &dyn JobQueue,
        handler: &dyn JobHandler,
        config: &WorkerPoolConfig,
        job: JobRecord,
    ) -> AttemptOutcome {
        debug!(job_id = %job.id, kind = %job.kind(), attempt = job.attempts, "running job");

        let outcome = match tokio::time::timeout(config.job_timeout, handler.handle(&job)).await {
            Ok(result) => result,
            Err(_) => Err(JobFailure::Retryable(format!(
                "job timed out after {}s",
                config.job_timeout.as_secs()
            ))),
        };

        let (disposition, recorded) = match outcome {
            Ok(summary) => {
                info!(job_id = %job.id, kind = %job.kind(), "job completed");
                (AttemptOutcome::Completed, queue.complete(&job.id, Some(summary)).await)
            }
            Err(JobFailure::RateLimited { retry_after, message }) => {
                let available_at = Utc::now() + chrono_duration(retry_after);
                warn!(job_id = %job.id, retry_after_secs = retry_after.as_secs(), "job deferred: {message}");
                (AttemptOutcome::Deferred, queue.defer(&job.id, available_at, &message).await)
            }
            Err(JobFailure::Permanent(message)) => {
                error!(job_id = %job.id, kind = %job.kind(), "job failed permanently: {message}");
                (AttemptOutcome::Failed, queue.fail(&job.id, &message).await)
            }
            Err(JobFailure::Retryable(message)) if config.retry.should_retry(job.attempts) => {
                let delay = config.retry.delay_for(job.attempts);
                warn!(
                    job_id = %job.id,
                    attempt = job.attempts,
                    retry_in_secs = delay.as_secs(),
                    "job attempt failed: {message}"
                );
                let available_at = Utc::now() + chrono_duration(delay);
                (AttemptOutcome::Retrying, queue.retry_later(&job.id, available_at, &message).await)
            }
            Err(JobFailure::Retryable(message)) => {
                error!(job_id = %job.id, attempts = job.attempts, "job exhausted retries: {message}");
                (AttemptOutcome::Failed, queue.fail(&job.id, &message).await)
            }
        };

        if let Err(e) = recorded {
            error!(job_id = %job.id, error = %e, "failed to record job outcome");
        }

        disposition
    }
}

fn chrono_duration(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::weeks(52))
}
