//! Layered configuration feeding a live engine

use crate::integration::test_utils::{with_xdg_env, Fixture, SETTLE};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;
use trawl::config::{global_config_path, ConfigLoader, PROJECT_CONFIG_FILE};
use trawl::TrawlConfig;

#[test]
fn test_project_file_overrides_global_file() {
    let test_dir = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();

    let config = with_xdg_env(test_dir.path(), || {
        let global = global_config_path().unwrap();
        fs::create_dir_all(global.parent().unwrap()).unwrap();
        fs::write(
            &global,
            "[cache]\ncapacity = 3\n\n[retrieval]\nmax_wait_ms = 700\n",
        )
        .unwrap();
        fs::write(
            project.path().join(PROJECT_CONFIG_FILE),
            "[retrieval]\nmax_wait_ms = 400\n",
        )
        .unwrap();

        TrawlConfig::load_validated(project.path()).unwrap()
    });

    assert_eq!(config.cache.capacity, 3);
    assert_eq!(config.retrieval.max_wait_ms, 400);
    // Untouched sections keep their defaults
    assert_eq!(config.search.thread_name, "trawl-search");
}

#[test]
fn test_invalid_project_file_is_rejected() {
    let test_dir = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    fs::write(
        project.path().join(PROJECT_CONFIG_FILE),
        "[cache]\ncapacity = 0\n",
    )
    .unwrap();

    let result = with_xdg_env(test_dir.path(), || TrawlConfig::load_validated(project.path()));
    assert!(matches!(result, Err(trawl::SearchError::ConfigError(_))));
}

#[test]
fn test_rendered_config_seeds_project_file() {
    let project = TempDir::new().unwrap();
    let mut config = TrawlConfig::default();
    config.collector.worker_threads = 3;
    fs::write(
        project.path().join(PROJECT_CONFIG_FILE),
        config.to_toml_string().unwrap(),
    )
    .unwrap();

    let loaded =
        ConfigLoader::load_from_file(&project.path().join(PROJECT_CONFIG_FILE)).unwrap();
    assert_eq!(loaded, config);
}

#[tokio::test]
async fn test_engine_honours_loaded_limits() {
    let fixture = Fixture::new();
    fs::write(
        fixture.root.join(PROJECT_CONFIG_FILE),
        r#"
[retrieval]
max_wait_ms = 250

[search]
thread_name = "fixture-search"
worker_threads = 1
max_blocking_threads = 8
"#,
    )
    .unwrap();
    let config = ConfigLoader::load_from_file(&fixture.root.join(PROJECT_CONFIG_FILE)).unwrap();

    let engine = fixture.engine_with(&config);
    assert_eq!(engine.retrieval_config().max_wait(), Duration::from_millis(250));

    let needle = "nothing".to_string();
    let capped = engine.until_timeout(&needle, Duration::from_secs(60));
    let found = tokio::time::timeout(SETTLE, capped)
        .await
        .unwrap()
        .unwrap();
    assert!(found.is_empty());
}
