//! End-to-end orchestrator tests over mock fetchers and wiremock-backed
//! asset/service endpoints.

use super::test_helpers::*;
use crate::registry::SourceRegistry;
use crate::types::{Event, HealthStatus, JobOptions, JobStatus, SourceRunStatus, Stage};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn dry_run() -> JobOptions {
    JobOptions {
        dry_run: true,
        ..JobOptions::default()
    }
}

#[tokio::test]
async fn sources_run_in_priority_order_and_items_persist() {
    let assets = MockServer::start().await;
    for id in ["a1", "a2", "b1"] {
        mount_pdf(&assets, id).await;
    }

    let mut registry = SourceRegistry::new();
    registry.register(Arc::new(
        MockFetcher::new("alpha", &assets.uri())
            .with_items(vec![raw_item("a1", "Author X"), raw_item("a2", "Author Y")])
            .paged(),
    ));
    registry.register(Arc::new(
        MockFetcher::new("beta", &assets.uri())
            .with_items(vec![raw_item("b1", "Author Z")])
            .paged(),
    ));

    let (ingestor, _dir) = create_test_ingestor(registry).await;
    enable_source(&ingestor, "alpha", 1).await;
    enable_source(&ingestor, "beta", 2).await;

    let mut events = ingestor.subscribe();
    let result = ingestor.run_job(JobOptions::default()).await.unwrap();

    assert_eq!(result.status, JobStatus::Completed);
    assert_eq!(result.sources.len(), 2);
    assert_eq!(result.sources[0].source, "alpha", "priority 1 runs first");
    assert_eq!(result.sources[0].added, 2);
    assert_eq!(result.sources[1].source, "beta");
    assert_eq!(result.sources[1].added, 1);

    assert_eq!(ingestor.db.count_books().await.unwrap(), 3);

    // Canonical fields made it through the mapper
    let book = ingestor.db.get_book("alpha", "a1").await.unwrap().unwrap();
    assert_eq!(book.title, "Title of a1");
    assert_eq!(book.author, "Author X");
    assert_eq!(book.year, Some(1900));
    assert!(book.asset_url.starts_with("http://assets.test/alpha/"));
    assert_eq!(book.asset_sha256.len(), 64);

    // Event stream confirms processing order
    let mut started = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let Event::SourceStarted { source } = event {
            started.push(source);
        }
    }
    assert_eq!(started, vec!["alpha", "beta"]);

    // Cursor advanced past the completed page
    assert_eq!(ingestor.db.get_fetch_cursor("alpha").await.unwrap(), Some(2));

    // Statistics applied and job logged
    let stats = ingestor.db.get_source_stats("alpha").await.unwrap().unwrap();
    assert_eq!(stats.total_succeeded, 2);
    assert_eq!(stats.last_run(), Some(SourceRunStatus::Succeeded));
    assert_eq!(ingestor.db.count_job_results().await.unwrap(), 1);
}

#[tokio::test]
async fn second_run_over_same_upstream_skips_every_item() {
    let assets = MockServer::start().await;
    for id in ["x1", "x2", "x3"] {
        mount_pdf(&assets, id).await;
    }

    let mut registry = SourceRegistry::new();
    // Not paged: the provider presents the same catalog on every page
    registry.register(Arc::new(MockFetcher::new("mock", &assets.uri()).with_items(vec![
        raw_item("x1", "A"),
        raw_item("x2", "B"),
        raw_item("x3", "C"),
    ])));

    let (ingestor, _dir) = create_test_ingestor(registry).await;
    enable_source(&ingestor, "mock", 1).await;

    let first = ingestor.run_job(JobOptions::default()).await.unwrap();
    assert_eq!(first.status, JobStatus::Completed);
    assert_eq!(first.sources[0].added, 3);
    assert_eq!(ingestor.db.count_books().await.unwrap(), 3);

    let mut events = ingestor.subscribe();
    let second = ingestor.run_job(JobOptions::default()).await.unwrap();

    assert_eq!(second.status, JobStatus::Completed);
    assert_eq!(second.sources[0].processed, 3);
    assert_eq!(second.sources[0].added, 0);
    assert_eq!(second.sources[0].skipped, 3, "every item is a known duplicate");
    assert_eq!(
        ingestor.db.count_books().await.unwrap(),
        3,
        "idempotency: record count unchanged"
    );

    let mut duplicate_skips = 0;
    while let Ok(event) = events.try_recv() {
        if let Event::ItemSkipped { reason, .. } = event {
            assert_eq!(reason, "duplicate");
            duplicate_skips += 1;
        }
    }
    assert_eq!(duplicate_skips, 3);
}

#[tokio::test]
async fn item_failure_never_aborts_the_batch() {
    let assets = MockServer::start().await;
    mount_pdf(&assets, "good-1").await;
    mount_asset(&assets, "broken", b"<html>not a pdf</html>".to_vec(), 0).await;
    mount_pdf(&assets, "good-2").await;

    let mut registry = SourceRegistry::new();
    registry.register(Arc::new(
        MockFetcher::new("mock", &assets.uri())
            .with_items(vec![
                raw_item("good-1", "A"),
                raw_item("broken", "B"),
                raw_item("good-2", "C"),
            ])
            .paged(),
    ));

    let (ingestor, _dir) = create_test_ingestor(registry).await;
    enable_source(&ingestor, "mock", 1).await;

    let result = ingestor.run_job(JobOptions::default()).await.unwrap();

    assert_eq!(result.status, JobStatus::Partial, "failures alongside successes");
    let report = &result.sources[0];
    assert_eq!(report.processed, 3);
    assert_eq!(report.added, 2, "items before and after the bad one persist");
    assert_eq!(report.failed, 1);
    assert_eq!(report.added + report.skipped + report.failed, report.processed);
    assert_eq!(report.errors[0].item_id, "broken");
    assert_eq!(report.errors[0].stage, Stage::Validate);

    assert!(ingestor.db.book_exists("mock", "good-1").await.unwrap());
    assert!(ingestor.db.book_exists("mock", "good-2").await.unwrap());
    assert!(!ingestor.db.book_exists("mock", "broken").await.unwrap());
}

#[tokio::test]
async fn dry_run_leaves_zero_observable_side_effects() {
    let assets = MockServer::start().await;
    mount_pdf(&assets, "d1").await;
    mount_pdf(&assets, "d2").await;

    let mut registry = SourceRegistry::new();
    registry.register(Arc::new(
        MockFetcher::new("mock", &assets.uri())
            .with_items(vec![raw_item("d1", "A"), raw_item("d2", "B")])
            .paged(),
    ));

    let (ingestor, dir) = create_test_ingestor(registry).await;
    enable_source(&ingestor, "mock", 1).await;

    let result = ingestor.run_job(dry_run()).await.unwrap();

    assert!(result.dry_run);
    assert_eq!(result.status, JobStatus::Completed);
    assert_eq!(result.sources[0].added, 2, "reports what would have happened");

    // Relational store untouched
    assert_eq!(ingestor.db.count_books().await.unwrap(), 0);
    assert_eq!(ingestor.db.count_job_results().await.unwrap(), 0);
    assert_eq!(ingestor.db.count_filter_decisions().await.unwrap(), 0);
    assert!(ingestor.db.get_fetch_cursor("mock").await.unwrap().is_none());
    assert!(ingestor.db.get_source_stats("mock").await.unwrap().is_none());

    // Object store untouched (the root is created lazily on first upload)
    let asset_root = dir.path().join("assets");
    let object_count = match std::fs::read_dir(&asset_root) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    };
    assert_eq!(object_count, 0);
}

#[tokio::test]
async fn author_filter_rejections_are_skipped_and_audited() {
    let assets = MockServer::start().await;
    mount_pdf(&assets, "austen-1").await;
    mount_pdf(&assets, "melville-1").await;

    let mut registry = SourceRegistry::new();
    registry.register(Arc::new(
        MockFetcher::new("mock", &assets.uri())
            .with_items(vec![
                raw_item("austen-1", "Jane Austen"),
                raw_item("melville-1", "Herman Melville"),
            ])
            .paged(),
    ));

    let (ingestor, _dir) = create_test_ingestor_with(registry, |config| {
        config.filters.enable_author_filter = true;
        config.filters.allowed_authors = vec!["austen".to_string()];
    })
    .await;
    enable_source(&ingestor, "mock", 1).await;

    let result = ingestor.run_job(JobOptions::default()).await.unwrap();

    assert_eq!(
        result.status,
        JobStatus::Completed,
        "filter rejections are expected outcomes, not failures"
    );
    assert_eq!(result.sources[0].added, 1);
    assert_eq!(result.sources[0].skipped, 1);

    assert!(ingestor.db.book_exists("mock", "austen-1").await.unwrap());
    assert!(!ingestor.db.book_exists("mock", "melville-1").await.unwrap());

    let decisions = ingestor.db.list_filter_decisions(None, 10).await.unwrap();
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].filter, "author");
    assert_eq!(decisions[0].item_id, "melville-1");
    assert!(decisions[0].reason.contains("Herman Melville"));
}

#[tokio::test]
async fn enabled_filter_with_empty_allow_list_passes_everything() {
    let assets = MockServer::start().await;
    mount_pdf(&assets, "f1").await;
    mount_pdf(&assets, "f2").await;

    let mut registry = SourceRegistry::new();
    registry.register(Arc::new(
        MockFetcher::new("mock", &assets.uri())
            .with_items(vec![raw_item("f1", "A"), raw_item("f2", "B")])
            .paged(),
    ));

    let (ingestor, _dir) = create_test_ingestor_with(registry, |config| {
        config.filters.enable_genre_filter = true;
        config.filters.allowed_genres = vec![];
        config.filters.enable_author_filter = true;
        config.filters.allowed_authors = vec![];
    })
    .await;
    enable_source(&ingestor, "mock", 1).await;

    let result = ingestor.run_job(JobOptions::default()).await.unwrap();
    assert_eq!(result.sources[0].added, 2, "fail-open: 100% pass through");
    assert_eq!(ingestor.db.count_filter_decisions().await.unwrap(), 0);
}

#[tokio::test]
async fn genre_filter_uses_classification_output() {
    let assets = MockServer::start().await;
    mount_pdf(&assets, "g1").await;

    let services = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/classify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "genres": ["Poetry"],
            "category": "Poetry"
        })))
        .mount(&services)
        .await;

    let mut registry = SourceRegistry::new();
    registry.register(Arc::new(
        MockFetcher::new("mock", &assets.uri())
            .with_items(vec![raw_item("g1", "A")])
            .paged(),
    ));

    let (ingestor, _dir) = create_test_ingestor_with(registry, |config| {
        config.classifier.enabled = true;
        config.classifier.endpoint = format!("{}/classify", services.uri());
        config.filters.enable_genre_filter = true;
        config.filters.allowed_genres = vec!["Fiction".to_string()];
    })
    .await;
    enable_source(&ingestor, "mock", 1).await;

    let result = ingestor.run_job(JobOptions::default()).await.unwrap();

    assert_eq!(result.sources[0].skipped, 1, "Poetry does not intersect [Fiction]");
    let decisions = ingestor.db.list_filter_decisions(None, 10).await.unwrap();
    assert_eq!(decisions[0].filter, "genre");
}

#[tokio::test]
async fn classification_failure_degrades_to_uncategorized() {
    let assets = MockServer::start().await;
    mount_pdf(&assets, "u1").await;

    let services = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/classify"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&services)
        .await;

    let mut registry = SourceRegistry::new();
    registry.register(Arc::new(
        MockFetcher::new("mock", &assets.uri())
            .with_items(vec![raw_item("u1", "A")])
            .paged(),
    ));

    let (ingestor, _dir) = create_test_ingestor_with(registry, |config| {
        config.classifier.enabled = true;
        config.classifier.endpoint = format!("{}/classify", services.uri());
    })
    .await;
    enable_source(&ingestor, "mock", 1).await;

    let result = ingestor.run_job(JobOptions::default()).await.unwrap();
    assert_eq!(result.sources[0].added, 1, "classification failure is non-fatal");

    let book = ingestor.db.get_book("mock", "u1").await.unwrap().unwrap();
    assert!(book.genre_tags().is_empty());
    assert_eq!(book.category, "Uncategorized");
}

#[tokio::test]
async fn unreachable_source_fails_the_job_when_nothing_processed() {
    let mut registry = SourceRegistry::new();
    registry.register(Arc::new(
        MockFetcher::new("mock", "http://unused.test").fail_all_fetches(),
    ));

    let (ingestor, _dir) = create_test_ingestor(registry).await;
    enable_source(&ingestor, "mock", 1).await;

    let result = ingestor.run_job(JobOptions::default()).await.unwrap();

    assert_eq!(
        result.status,
        JobStatus::Failed,
        "systemic failure before any item could be processed"
    );
    assert_eq!(result.sources[0].processed, 0);
    assert_eq!(result.sources[0].errors[0].stage, Stage::Fetch);

    let stats = ingestor.db.get_source_stats("mock").await.unwrap().unwrap();
    assert_eq!(stats.last_run(), Some(SourceRunStatus::Failed));

    let health = ingestor.source_health("mock").await.unwrap();
    assert_eq!(health.status, HealthStatus::Failed);
    assert!(health.error_count_24h >= 1);
}

#[tokio::test]
async fn later_source_still_runs_after_earlier_one_fails() {
    let assets = MockServer::start().await;
    mount_pdf(&assets, "b1").await;

    let mut registry = SourceRegistry::new();
    registry.register(Arc::new(
        MockFetcher::new("alpha", "http://unused.test").fail_all_fetches(),
    ));
    registry.register(Arc::new(
        MockFetcher::new("beta", &assets.uri())
            .with_items(vec![raw_item("b1", "A")])
            .paged(),
    ));

    let (ingestor, _dir) = create_test_ingestor(registry).await;
    enable_source(&ingestor, "alpha", 1).await;
    enable_source(&ingestor, "beta", 2).await;

    let result = ingestor.run_job(JobOptions::default()).await.unwrap();

    assert_eq!(result.status, JobStatus::Partial);
    assert_eq!(result.sources.len(), 2, "beta must not be skipped");
    assert_eq!(result.sources[1].source, "beta");
    assert_eq!(result.sources[1].added, 1);
    assert!(ingestor.db.book_exists("beta", "b1").await.unwrap());
}

#[tokio::test]
async fn rate_limited_fetch_waits_and_retries_once() {
    let assets = MockServer::start().await;
    mount_pdf(&assets, "r1").await;

    let fetcher = Arc::new(
        MockFetcher::new("mock", &assets.uri())
            .with_items(vec![raw_item("r1", "A")])
            .paged()
            .rate_limit_first_call(),
    );

    let mut registry = SourceRegistry::new();
    registry.register(fetcher.clone());

    let (ingestor, _dir) = create_test_ingestor(registry).await;
    enable_source(&ingestor, "mock", 1).await;

    let result = ingestor.run_job(JobOptions::default()).await.unwrap();

    assert_eq!(result.status, JobStatus::Completed);
    assert_eq!(result.sources[0].added, 1);
    assert_eq!(
        fetcher.fetch_calls.load(std::sync::atomic::Ordering::SeqCst),
        2,
        "one rate-limited call, one retry after the advertised wait"
    );
}

#[tokio::test]
async fn stop_finalizes_with_accumulated_results() {
    let assets = MockServer::start().await;
    for id in ["s1", "s2", "s3", "s4"] {
        let mut body = b"%PDF-1.4\n".to_vec();
        body.extend_from_slice(id.as_bytes());
        mount_asset(&assets, id, body, 150).await;
    }

    let mut registry = SourceRegistry::new();
    registry.register(Arc::new(
        MockFetcher::new("mock", &assets.uri())
            .with_items(vec![
                raw_item("s1", "A"),
                raw_item("s2", "B"),
                raw_item("s3", "C"),
                raw_item("s4", "D"),
            ])
            .paged(),
    ));

    let (ingestor, _dir) = create_test_ingestor(registry).await;
    enable_source(&ingestor, "mock", 1).await;

    let runner = ingestor.clone();
    let handle = tokio::spawn(async move { runner.run_job(JobOptions::default()).await });

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(ingestor.stop());

    let result = handle.await.unwrap().unwrap();
    let report = &result.sources[0];

    assert!(
        report.processed < 4,
        "stop between items must leave later items unprocessed"
    );
    assert_eq!(report.added + report.skipped + report.failed, report.processed);
    assert!(
        ingestor.db.count_books().await.unwrap() >= 1,
        "already-persisted items remain persisted"
    );
    // Stopped mid-page: the cursor must not advance past unprocessed items
    assert!(ingestor.db.get_fetch_cursor("mock").await.unwrap().is_none());
}

#[tokio::test]
async fn pause_suspends_between_items_and_resume_continues() {
    let assets = MockServer::start().await;
    for id in ["p1", "p2", "p3", "p4"] {
        let mut body = b"%PDF-1.4\n".to_vec();
        body.extend_from_slice(id.as_bytes());
        mount_asset(&assets, id, body, 150).await;
    }

    let mut registry = SourceRegistry::new();
    registry.register(Arc::new(
        MockFetcher::new("mock", &assets.uri())
            .with_items(vec![
                raw_item("p1", "A"),
                raw_item("p2", "B"),
                raw_item("p3", "C"),
                raw_item("p4", "D"),
            ])
            .paged(),
    ));

    let (ingestor, _dir) = create_test_ingestor(registry).await;
    enable_source(&ingestor, "mock", 1).await;

    let runner = ingestor.clone();
    let handle = tokio::spawn(async move { runner.run_job(JobOptions::default()).await });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(ingestor.pause());

    // The in-flight item completes, then the loop holds
    tokio::time::sleep(Duration::from_millis(300)).await;
    let during_pause = ingestor.db.count_books().await.unwrap();
    assert!(during_pause < 4);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(
        ingestor.db.count_books().await.unwrap(),
        during_pause,
        "no progress while paused"
    );

    // Only one job at a time, even while paused
    let concurrent = ingestor.run_job(JobOptions::default()).await;
    assert!(matches!(
        concurrent,
        Err(crate::error::Error::JobAlreadyRunning)
    ));

    assert!(ingestor.resume());
    let result = handle.await.unwrap().unwrap();

    assert_eq!(result.status, JobStatus::Completed);
    assert_eq!(result.sources[0].added, 4, "resume finishes the remaining items");
    assert_eq!(ingestor.db.count_books().await.unwrap(), 4);
}

#[tokio::test]
async fn cursor_walks_pages_and_resets_at_catalog_end() {
    let assets = MockServer::start().await;
    mount_pdf(&assets, "c1").await;
    mount_pdf(&assets, "c2").await;

    let mut registry = SourceRegistry::new();
    registry.register(Arc::new(
        MockFetcher::new("mock", &assets.uri())
            .with_items(vec![raw_item("c1", "A"), raw_item("c2", "B")])
            .paged(),
    ));

    let (ingestor, _dir) = create_test_ingestor(registry).await;
    enable_source(&ingestor, "mock", 1).await;

    // Run 1: page 1 persists, cursor advances
    let first = ingestor.run_job(JobOptions::default()).await.unwrap();
    assert_eq!(first.sources[0].added, 2);
    assert_eq!(ingestor.db.get_fetch_cursor("mock").await.unwrap(), Some(2));

    // Run 2: page 2 is empty — catalog exhausted, cursor cleared
    let second = ingestor.run_job(JobOptions::default()).await.unwrap();
    assert_eq!(second.sources[0].processed, 0);
    assert_eq!(second.status, JobStatus::Completed);
    assert!(ingestor.db.get_fetch_cursor("mock").await.unwrap().is_none());

    // Run 3: back to page 1, everything already known
    let third = ingestor.run_job(JobOptions::default()).await.unwrap();
    assert_eq!(third.sources[0].skipped, 2);
    assert_eq!(ingestor.db.count_books().await.unwrap(), 2);
}

#[tokio::test]
async fn occupied_storage_path_fails_the_item() {
    let assets = MockServer::start().await;
    mount_pdf(&assets, "col").await;
    mount_pdf(&assets, "ok").await;

    let mut registry = SourceRegistry::new();
    registry.register(Arc::new(
        MockFetcher::new("mock", &assets.uri())
            .with_items(vec![raw_item("col", "A"), raw_item("ok", "B")])
            .paged(),
    ));

    let (ingestor, dir) = create_test_ingestor(registry).await;
    enable_source(&ingestor, "mock", 1).await;

    // Occupy the deterministic path for item "col" before the run
    let occupied = dir.path().join("assets").join("mock");
    std::fs::create_dir_all(&occupied).unwrap();
    std::fs::write(occupied.join("col.pdf"), b"pre-existing object").unwrap();

    let result = ingestor.run_job(JobOptions::default()).await.unwrap();

    assert_eq!(result.status, JobStatus::Partial);
    let report = &result.sources[0];
    assert_eq!(report.failed, 1, "an occupied path is a dedup miss, not a clobber");
    assert_eq!(report.added, 1);
    assert_eq!(report.errors[0].item_id, "col");
    assert_eq!(report.errors[0].stage, Stage::Store);

    let untouched = std::fs::read(occupied.join("col.pdf")).unwrap();
    assert_eq!(untouched, b"pre-existing object");
}

#[tokio::test]
async fn job_history_returns_logged_results() {
    let assets = MockServer::start().await;
    mount_pdf(&assets, "h1").await;

    let mut registry = SourceRegistry::new();
    registry.register(Arc::new(
        MockFetcher::new("mock", &assets.uri())
            .with_items(vec![raw_item("h1", "A")])
            .paged(),
    ));

    let (ingestor, _dir) = create_test_ingestor(registry).await;
    enable_source(&ingestor, "mock", 1).await;

    ingestor.run_job(JobOptions::default()).await.unwrap();

    let history = ingestor.job_history(10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, JobStatus::Completed);
    assert_eq!(history[0].sources[0].added, 1);
}

#[tokio::test]
async fn shutdown_refuses_new_jobs() {
    let (ingestor, _dir) = create_test_ingestor(SourceRegistry::new()).await;
    ingestor.shutdown().await.unwrap();

    let result = ingestor.run_job(JobOptions::default()).await;
    assert!(matches!(result, Err(crate::error::Error::ShuttingDown)));
}
