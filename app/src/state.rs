//! Application state: one explicitly wired handle per subsystem.

use crate::handler::EventideJobHandler;
use anyhow::Context;
use eventide_browser::{pick_user_agent, RateLimiter};
use eventide_core::AppConfig;
use eventide_db::Database;
use eventide_dedup::DedupEngine;
use eventide_scheduler::{JobQueue, RetryPolicy, Scheduler, WorkerPool, WorkerPoolConfig};
use eventide_scraper::{
    FreshnessChecker, HeadlessBrowserStrategy, HttpFetcher, JsonApiStrategy,
    ManagedServiceStrategy, ScrapeOrchestrator, StaticHtmlStrategy,
};
use eventide_sources::{SourceLoader, SourceRegistry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Shared state behind the worker pool, the scheduler and admin commands.
pub struct AppState {
    /// Loaded configuration
    pub config: AppConfig,
    /// Database handle, opened once at startup
    pub db: Database,
    /// Source registry
    pub registry: Arc<SourceRegistry>,
    /// Scrape orchestrator
    pub orchestrator: Arc<ScrapeOrchestrator>,
    /// Durable job queue
    pub queue: Arc<dyn JobQueue>,
    /// Enqueue helpers
    pub scheduler: Scheduler,
}

impl AppState {
    /// Open the configured database and build the state on top of it.
    pub async fn open(config: AppConfig) -> anyhow::Result<Self> {
        let db_path = config.database_path().context("resolve database path")?;
        info!(path = %db_path.display(), "opening database");

        let db = Database::from_config(&config.database, &db_path)
            .await
            .context("connect to database")?;
        Self::with_database(config, db).await
    }

    /// Build the state over an already-open database.
    ///
    /// Applies migrations, loads the registry and imports definition files
    /// when a definitions directory is configured.
    pub async fn with_database(config: AppConfig, db: Database) -> anyhow::Result<Self> {
        db.run_migrations().await.context("run migrations")?;

        let registry = Arc::new(SourceRegistry::new(
            Arc::new(db.source_store()),
            config.sources.error_threshold,
        ));
        let loaded = registry.initialize().await.context("load sources")?;
        info!(sources = loaded, "source registry ready");

        if let Some(dir) = &config.sources.definitions_dir {
            match SourceLoader::new(dir) {
                Ok(loader) => {
                    registry.import(&loader).await.context("import source definitions")?;
                }
                Err(e) => warn!(dir = %dir.display(), error = %e, "skipping source import"),
            }
        }

        let orchestrator = Arc::new(build_orchestrator(&config, registry.clone(), &db)?);
        let queue: Arc<dyn JobQueue> = Arc::new(db.job_queue());
        let interval = u32::try_from(config.scheduler.interval_minutes).unwrap_or(u32::MAX);
        let scheduler = Scheduler::new(queue.clone(), interval);

        Ok(Self {
            config,
            db,
            registry,
            orchestrator,
            queue,
            scheduler,
        })
    }

    /// Handler executing every job kind against this state.
    #[must_use]
    pub fn job_handler(&self) -> Arc<EventideJobHandler> {
        Arc::new(EventideJobHandler::new(
            self.orchestrator.clone(),
            self.registry.clone(),
            self.queue.clone(),
            self.db.clone(),
        ))
    }

    /// Worker pool over the job queue, sized from configuration.
    #[must_use]
    pub fn worker_pool(&self) -> WorkerPool {
        WorkerPool::new(self.queue.clone(), self.job_handler(), self.worker_config())
    }

    /// Worker pool settings derived from configuration.
    #[must_use]
    pub fn worker_config(&self) -> WorkerPoolConfig {
        WorkerPoolConfig {
            concurrency: self.config.worker.concurrency,
            job_timeout: Duration::from_secs(self.config.worker.job_timeout_secs),
            poll_interval: Duration::from_millis(self.config.worker.poll_interval_ms),
            retry: RetryPolicy::new(
                self.config.retry.attempts,
                Duration::from_millis(self.config.retry.backoff_base_ms),
            ),
        }
    }

    /// A fresh recurring scheduler over the same queue.
    #[must_use]
    pub fn recurring_scheduler(&self) -> Scheduler {
        let interval = u32::try_from(self.config.scheduler.interval_minutes).unwrap_or(u32::MAX);
        Scheduler::new(self.queue.clone(), interval)
    }
}

fn build_orchestrator(
    config: &AppConfig,
    registry: Arc<SourceRegistry>,
    db: &Database,
) -> anyhow::Result<ScrapeOrchestrator> {
    let scraping = &config.scraping;
    let strategy_timeout = Duration::from_secs(scraping.strategy_timeout_secs);

    let client = reqwest::Client::builder()
        .timeout(strategy_timeout)
        .build()
        .context("build HTTP client")?;
    let limiter = RateLimiter::new(scraping.min_request_delay_ms);
    let http = HttpFetcher::new(client.clone(), limiter.clone());

    let mut orchestrator = ScrapeOrchestrator::new(
        registry,
        Arc::new(db.event_store()),
        DedupEngine::new(config.dedup.clone()),
    )
    .with_strategy(Arc::new(StaticHtmlStrategy::new(http.clone(), scraping.user_agents.clone())))
    .with_strategy(Arc::new(HeadlessBrowserStrategy::new(
        limiter.clone(),
        scraping.user_agents.clone(),
        strategy_timeout,
    )))
    .with_strategy(Arc::new(JsonApiStrategy::new(http.clone(), scraping.user_agents.clone())))
    .with_strategy_timeout(strategy_timeout)
    .with_max_concurrent_scrapes(config.worker.concurrency);

    if let Some(url) = &scraping.managed_service_url {
        orchestrator = orchestrator.with_strategy(Arc::new(ManagedServiceStrategy::new(
            client,
            url,
            scraping.managed_service_token.clone(),
            limiter,
        )));
    }

    if scraping.freshness_check {
        let user_agent = pick_user_agent(&scraping.user_agents);
        orchestrator = orchestrator.with_freshness(Arc::new(FreshnessChecker::new(http, user_agent)));
    }

    Ok(orchestrator)
}
