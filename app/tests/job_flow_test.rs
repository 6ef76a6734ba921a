//! End-to-end job flow over an in-memory database: commands enqueue, the
//! worker pool runs, the registry and run history reflect the outcome.

use eventide_app::commands::{jobs, metrics, sources};
use eventide_app::state::AppState;
use eventide_core::AppConfig;
use eventide_db::{Database, RunStatus};
use eventide_scheduler::{JobPayload, JobStatus};
use eventide_sources::{SourceDefinition, SourceFilter};

// Nothing listens on the discard port, so every fetch fails fast.
const UNREACHABLE: &str = r#"
[source]
id = "dead-venue"
name = "Dead Venue"
url = "http://127.0.0.1:9/events"
source_type = "website"

[scrape]
strategies = ["static-html"]

[scrape.selectors]
event_container = ".event"
title = "h2"
"#;

const BOX_OFFICE: &str = r#"
[source]
id = "box-office"
name = "Box Office Entries"
url = "https://box-office.example.org"
source_type = "manual"
"#;

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.sources.error_threshold = 2;
    config.scraping.min_request_delay_ms = 0;
    config.scraping.freshness_check = false;
    config.scraping.strategy_timeout_secs = 5;
    config.retry.attempts = 1;
    config
}

async fn test_state() -> AppState {
    let db = Database::in_memory().await.expect("open database");
    AppState::with_database(test_config(), db)
        .await
        .expect("build state")
}

async fn add_unreachable_source(state: &AppState) {
    let definition: SourceDefinition = toml::from_str(UNREACHABLE).expect("parse definition");
    sources::create_source(state, definition)
        .await
        .expect("create source");
}

#[tokio::test]
async fn failing_source_is_deactivated_past_threshold() {
    let state = test_state().await;
    add_unreachable_source(&state).await;
    let pool = state.worker_pool();

    for attempt in 1..=3 {
        let job = jobs::scrape_now(&state, "dead-venue", true)
            .await
            .expect("enqueue scrape");
        assert_eq!(pool.run_until_idle().await.expect("run jobs"), 1);

        let job = jobs::get_job(&state, job.id.as_str()).await.expect("job");
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.last_error.is_some());

        let source = sources::get_source(&state, "dead-venue").expect("source");
        assert_eq!(source.error_count, attempt);
    }

    let source = sources::get_source(&state, "dead-venue").expect("source");
    assert!(!source.is_active);

    let err = jobs::scrape_now(&state, "dead-venue", true)
        .await
        .expect_err("inactive source is rejected");
    assert_eq!(err.code, "SOURCE_INACTIVE");

    let runs = metrics::recent_scrape_runs(&state, Some("dead-venue"), 10)
        .await
        .expect("runs");
    assert_eq!(runs.len(), 3);
    assert!(runs.iter().all(|run| run.status == RunStatus::Failed));

    sources::reset_source_errors(&state, "dead-venue")
        .await
        .expect("reset");
    let source = sources::activate_source(&state, "dead-venue")
        .await
        .expect("activate");
    assert!(source.is_active);
    assert_eq!(source.error_count, 0);

    let job = jobs::scrape_now(&state, "dead-venue", false)
        .await
        .expect("enqueue after reactivation");
    assert_eq!(job.status, JobStatus::Queued);
}

#[tokio::test]
async fn unknown_sources_are_rejected_before_enqueue() {
    let state = test_state().await;

    let err = jobs::scrape_now(&state, "nowhere", true)
        .await
        .expect_err("unknown source");
    assert_eq!(err.code, "SOURCE_NOT_FOUND");

    let err = jobs::scrape_now(&state, "Not An Id", true)
        .await
        .expect_err("malformed id");
    assert_eq!(err.code, "INVALID_ID");

    let page = jobs::list_jobs(&state, None, 1, 20).await.expect("list");
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn health_check_job_reports_queue_and_sources() {
    let state = test_state().await;
    add_unreachable_source(&state).await;

    let job = jobs::health_check(&state).await.expect("enqueue health check");
    state.worker_pool().run_until_idle().await.expect("run jobs");

    let job = jobs::get_job(&state, job.id.as_str()).await.expect("job");
    assert_eq!(job.status, JobStatus::Completed);
    let report = job.result.expect("health report");
    assert_eq!(report["database_reachable"], true);
    assert_eq!(report["active_sources"], 1);
    assert_eq!(report["inactive_sources"], 0);
}

#[tokio::test]
async fn bulk_schedule_fans_out_one_job_per_scraped_source() {
    let state = test_state().await;
    add_unreachable_source(&state).await;
    sources::deactivate_source(&state, "dead-venue")
        .await
        .expect("deactivate");

    let definition: SourceDefinition =
        toml::from_str(&UNREACHABLE.replace("dead-venue", "other-venue")).expect("parse");
    sources::create_source(&state, definition)
        .await
        .expect("create second source");
    let manual: SourceDefinition = toml::from_str(BOX_OFFICE).expect("parse manual");
    sources::create_source(&state, manual)
        .await
        .expect("create manual source");

    let err = jobs::scrape_now(&state, "box-office", true)
        .await
        .expect_err("manual source has nothing to scrape");
    assert_eq!(err.code, "SOURCE_NOT_SCRAPED");

    let bulk = jobs::schedule_bulk(&state, 0).await.expect("enqueue bulk");
    let pool = state.worker_pool();
    // Fan-out plus the one scrape it enqueues.
    assert_eq!(pool.run_until_idle().await.expect("run jobs"), 2);

    let bulk = jobs::get_job(&state, bulk.id.as_str()).await.expect("job");
    assert_eq!(bulk.status, JobStatus::Completed);
    assert_eq!(bulk.result.expect("fan-out result")["enqueued"], 1);

    let page = jobs::list_jobs(&state, None, 1, 20).await.expect("list");
    assert_eq!(page.total, 2);
    let scrape = page
        .jobs
        .iter()
        .find(|job| matches!(job.payload, JobPayload::ScrapeSource { .. }))
        .expect("fanned-out scrape job");
    assert!(matches!(
        &scrape.payload,
        JobPayload::ScrapeSource { source_id } if source_id.as_str() == "other-venue"
    ));

    let manual = sources::get_source(&state, "box-office").expect("manual source");
    assert!(manual.is_active);
    assert_eq!(manual.error_count, 0);
}

#[tokio::test]
async fn failed_jobs_can_be_retried() {
    let state = test_state().await;
    add_unreachable_source(&state).await;

    let job = jobs::scrape_now(&state, "dead-venue", true)
        .await
        .expect("enqueue");
    state.worker_pool().run_until_idle().await.expect("run jobs");

    let failed = jobs::list_jobs(&state, Some(JobStatus::Failed), 1, 20)
        .await
        .expect("list failed");
    assert_eq!(failed.total, 1);

    let retried = jobs::retry_job(&state, job.id.as_str()).await.expect("retry");
    assert_eq!(retried.status, JobStatus::Queued);
    assert_eq!(retried.attempts, 0);

    let err = jobs::retry_job(&state, job.id.as_str())
        .await
        .expect_err("queued job cannot be retried");
    assert_eq!(err.code, "INVALID_JOB_STATE");

    let err = jobs::get_job(&state, "missing-job").await.expect_err("missing");
    assert_eq!(err.code, "JOB_NOT_FOUND");
}

#[tokio::test]
async fn listing_and_import_commands() {
    let state = test_state().await;
    add_unreachable_source(&state).await;

    let dir = tempfile::TempDir::new().expect("temp dir");
    std::fs::write(
        dir.path().join("other.toml"),
        UNREACHABLE.replace("dead-venue", "other-venue"),
    )
    .expect("write definition");

    let summary = sources::import_sources(&state, Some(dir.path()))
        .await
        .expect("import");
    assert_eq!(summary.created, 1);

    let all = sources::list_sources(&state, SourceFilter::default());
    let ids: Vec<_> = all.iter().map(|s| s.id.as_str().to_string()).collect();
    assert_eq!(ids, vec!["dead-venue", "other-venue"]);

    let err = jobs::list_jobs(&state, None, 1, 0).await.expect_err("bad page size");
    assert_eq!(err.code, "INVALID_PAGE_SIZE");

    sources::delete_source(&state, "other-venue").await.expect("delete");
    let err = sources::get_source(&state, "other-venue").expect_err("deleted");
    assert_eq!(err.code, "SOURCE_NOT_FOUND");

    let metrics = metrics::rolling_metrics(&state).await.expect("metrics");
    assert_eq!(metrics.events_created_today, 0);
}
