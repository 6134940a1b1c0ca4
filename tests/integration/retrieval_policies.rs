//! Retrieval policies against a real directory tree

use crate::integration::test_utils::{file_names, Fixture, MemoryTree, SETTLE};
use std::time::{Duration, Instant};
use trawl::SearchError;

fn key(s: &str) -> String {
    s.to_string()
}

#[tokio::test]
async fn test_first_finds_readme() {
    let fixture = Fixture::new();
    let engine = fixture.engine();

    let found = tokio::time::timeout(SETTLE, engine.first(&key("README")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found, fixture.path("dirA/README.md"));
}

#[tokio::test]
async fn test_until_count_returns_exactly_count() {
    let fixture = Fixture::new();
    let engine = fixture.engine();

    let found = tokio::time::timeout(SETTLE, engine.until_count(&key("README"), 1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found, vec![fixture.path("dirA/README.md")]);

    // Both markdown files plus nothing else
    let found = tokio::time::timeout(SETTLE, engine.until_count(&key(".md"), 2))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(file_names(&found), vec!["README.md", "delete.md"]);
}

#[tokio::test]
async fn test_until_timeout_waits_full_deadline_on_miss() {
    let fixture = Fixture::new();
    let engine = fixture.engine();

    let started = Instant::now();
    let found = engine
        .until_timeout(&key("nonexistent.key"), Duration::from_millis(1000))
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert!(found.is_empty());
    assert!(elapsed >= Duration::from_millis(1000), "returned after {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(3000), "returned after {:?}", elapsed);
}

#[tokio::test]
async fn test_until_timeout_collects_everything() {
    let fixture = Fixture::new();
    let engine = fixture.engine();

    let found = engine
        .until_timeout(&key("d"), Duration::from_millis(500))
        .await
        .unwrap();
    // Directory names are matches too
    assert_eq!(
        file_names(&found),
        vec!["README.md", "delete.md", "dirA", "dirB", "nested"]
    );
}

#[tokio::test]
async fn test_until_count_or_timeout_returns_early_on_count() {
    let fixture = Fixture::new();
    let engine = fixture.engine();

    let started = Instant::now();
    let found = engine
        .until_count_or_timeout(&key("README"), 1, Duration::from_millis(3000))
        .await
        .unwrap();
    assert_eq!(found, vec![fixture.path("dirA/README.md")]);
    assert!(started.elapsed() < Duration::from_millis(2000));
}

#[tokio::test]
async fn test_until_count_or_timeout_waits_deadline_on_miss() {
    let fixture = Fixture::new();
    let engine = fixture.engine();

    let started = Instant::now();
    let found = engine
        .until_count_or_timeout(&key("nonexistent.key"), 1, Duration::from_millis(3000))
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert!(found.is_empty());
    assert!(elapsed >= Duration::from_millis(3000), "returned after {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(5000), "returned after {:?}", elapsed);
}

#[tokio::test]
async fn test_until_count_or_timeout_honours_larger_counts() {
    let engine = MemoryTree::wide(4).into_engine();

    let found = engine
        .until_count_or_timeout(&key("leaf-1"), 3, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(found.len(), 3);
    assert!(found.iter().all(|item| item.starts_with("leaf-1-")));
}

#[tokio::test]
async fn test_first_within_times_out() {
    let fixture = Fixture::new();
    let engine = fixture.engine();

    let started = Instant::now();
    let result = engine
        .first_within(&key("nonexistent.key"), Duration::from_millis(300))
        .await;
    assert!(matches!(
        result,
        Err(SearchError::TimedOut { waited }) if waited == Duration::from_millis(300)
    ));
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn test_first_within_finds_match() {
    let fixture = Fixture::new();
    let engine = fixture.engine();

    let found = engine
        .first_within(&key("notes"), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(found, fixture.path("dirB/nested/notes.txt"));
}

#[tokio::test]
async fn test_gap_timeout_ends_after_silence() {
    // 30ms per node; the gap between matches stays well below 400ms
    let engine = MemoryTree::chain(5)
        .with_delay(Duration::from_millis(30))
        .into_engine();

    let started = Instant::now();
    let found = engine
        .until_gap_timeout(&key("step"), Duration::from_millis(400))
        .await
        .unwrap();

    assert_eq!(found, vec!["step-1", "step-2", "step-3", "step-4", "step-5"]);
    assert!(started.elapsed() >= Duration::from_millis(400));
}

#[tokio::test]
async fn test_count_or_gap_stops_at_count() {
    let engine = MemoryTree::chain(5)
        .with_delay(Duration::from_millis(30))
        .into_engine();

    let found = engine
        .until_count_or_gap_timeout(&key("step"), 2, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(found, vec!["step-1", "step-2"]);
}

#[tokio::test]
async fn test_count_or_gap_stops_on_silence() {
    let engine = MemoryTree::chain(2).into_engine();

    let started = Instant::now();
    let found = engine
        .until_count_or_gap_timeout(&key("step"), 10, Duration::from_millis(300))
        .await
        .unwrap();
    assert_eq!(found, vec!["step-1", "step-2"]);
    assert!(started.elapsed() < SETTLE);
}

#[tokio::test]
async fn test_repeated_drains_see_same_results() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    let md = key(".md");

    let first = engine.until_timeout(&md, Duration::from_millis(500)).await.unwrap();
    let second = engine.until_timeout(&md, Duration::from_millis(200)).await.unwrap();
    let third = engine
        .until_count_or_gap_timeout(&md, 10, Duration::from_millis(100))
        .await
        .unwrap();

    assert_eq!(file_names(&first), vec!["README.md", "delete.md"]);
    assert_eq!(file_names(&second), file_names(&first));
    assert_eq!(file_names(&third), file_names(&first));
    assert_eq!(engine.search_stats().runs, 1);
    assert_eq!(engine.channel(&md).unwrap().len(), 2);
}

#[tokio::test]
async fn test_zero_count_returns_empty_but_starts_search() {
    let engine = MemoryTree::wide(2).into_engine();
    let leaf = key("leaf");

    assert!(engine.until_count(&leaf, 0).await.unwrap().is_empty());
    assert!(engine
        .until_count_or_timeout(&leaf, 0, Duration::from_secs(5))
        .await
        .unwrap()
        .is_empty());
    assert!(engine.cache().contains(&leaf));

    let found = engine.until_count(&leaf, 4).await.unwrap();
    assert_eq!(found.len(), 4);
}

#[tokio::test]
async fn test_waits_are_capped() {
    let mut config = trawl::TrawlConfig::default();
    config.retrieval.max_wait_ms = 200;
    let engine = MemoryTree::wide(1).into_engine_with(&config);

    let started = Instant::now();
    let found = engine
        .until_timeout(&key("missing"), Duration::from_secs(60))
        .await
        .unwrap();
    assert!(found.is_empty());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_channel_drain_is_not_republished() {
    let engine = MemoryTree::wide(1).into_engine();
    let leaf = key("leaf");
    let channel = engine.channel(&leaf).unwrap();

    let taken = tokio::time::timeout(SETTLE, channel.take()).await.unwrap();
    assert_eq!(taken, "leaf-0-0");
    assert!(engine.channel(&leaf).unwrap().is_empty());
}
