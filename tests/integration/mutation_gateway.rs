//! Domain mutations routed through the engine

use crate::integration::test_utils::{eventually, file_names, Fixture, MemoryTree, SETTLE};
use std::time::Duration;

#[tokio::test]
async fn test_add_file_invalidates_and_is_found() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    let key = "test".to_string();

    assert!(engine
        .until_timeout(&key, Duration::from_millis(300))
        .await
        .unwrap()
        .is_empty());
    assert!(!engine.is_cache_empty());

    let created = fixture.path("dirA/test");
    assert!(engine.add(&created).unwrap());
    assert!(created.is_file());
    assert!(engine.is_cache_empty());

    let found = tokio::time::timeout(SETTLE, engine.first(&key))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found, created);
}

#[tokio::test]
async fn test_add_existing_file_keeps_cache() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    engine.channel(&"README".to_string()).unwrap();

    assert!(!engine.add(&fixture.path("dirA/README.md")).unwrap());
    assert!(!engine.is_cache_empty());
}

#[tokio::test]
async fn test_remove_file_invalidates_and_disappears() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    let md = ".md".to_string();

    let before = engine.until_count(&md, 2).await.unwrap();
    assert_eq!(file_names(&before), vec!["README.md", "delete.md"]);

    let doomed = fixture.path("dirA/delete.md");
    assert!(engine.remove(&doomed).unwrap());
    assert!(!doomed.exists());
    assert!(engine.is_cache_empty());

    let after = engine
        .until_timeout(&md, Duration::from_millis(500))
        .await
        .unwrap();
    assert_eq!(file_names(&after), vec!["README.md"]);
}

#[tokio::test]
async fn test_remove_missing_file_keeps_cache() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    engine.channel(&"README".to_string()).unwrap();

    assert!(!engine.remove(&fixture.path("dirA/never-existed")).unwrap());
    assert!(!engine.is_cache_empty());
}

#[tokio::test]
async fn test_mutation_error_surfaces_and_keeps_cache() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    engine.channel(&"README".to_string()).unwrap();

    // Parent directory does not exist
    let result = engine.add(&fixture.path("missing/child.txt"));
    assert!(matches!(result, Err(trawl::SearchError::Model(_))));
    assert!(!engine.is_cache_empty());
}

#[tokio::test]
async fn test_remove_prunes_subtree_in_memory() {
    let engine = MemoryTree::wide(2).into_engine();
    let leaf = "leaf".to_string();
    assert_eq!(engine.until_count(&leaf, 4).await.unwrap().len(), 4);

    assert!(engine.remove(&"branch-0".to_string()).unwrap());
    let mut found = engine
        .until_timeout(&leaf, Duration::from_millis(300))
        .await
        .unwrap();
    found.sort();
    assert_eq!(found, vec!["leaf-1-0", "leaf-1-1"]);
    assert_eq!(engine.search_stats().runs, 2);
}

#[tokio::test]
async fn test_invalidation_only_drops_cache_references() {
    let engine = MemoryTree::wide(1).into_engine();
    let leaf = "leaf".to_string();
    let held = engine.channel(&leaf).unwrap();
    eventually(|| !held.is_empty()).await;

    assert!(engine.add(&"extra-leaf".to_string()).unwrap());

    // A channel already handed out keeps its stale contents
    assert_eq!(held.snapshot(), vec!["leaf-0-0"]);
    let fresh = engine.channel(&leaf).unwrap();
    assert!(!std::sync::Arc::ptr_eq(&held, &fresh));
}
