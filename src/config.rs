//! Configuration System
//!
//! Layered configuration for the search engine: built-in defaults, the global
//! config file, the project `trawl.toml`, then `TRAWL__` environment overrides.
//! Every section deserializes with defaults so partial files are valid.

use crate::error::SearchError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

mod merge;
mod sources;

pub use merge::merge_policy::{ENV_PREFIX, ENV_SEPARATOR};
pub use sources::global_file::global_config_path;
pub use sources::project_file::{project_config_path, PROJECT_CONFIG_FILE};

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrawlConfig {
    /// Pool that evaluates nodes
    #[serde(default = "PoolConfig::search")]
    pub search: PoolConfig,

    /// Pool that runs background collectors for deadline-racing retrievals
    #[serde(default = "PoolConfig::collector")]
    pub collector: PoolConfig,

    /// Result channel cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Retrieval limits
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TrawlConfig {
    fn default() -> Self {
        Self {
            search: PoolConfig::search(),
            collector: PoolConfig::collector(),
            cache: CacheConfig::default(),
            retrieval: RetrievalConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Sizing for one worker pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Prefix for the names of the pool's OS threads
    pub thread_name: String,

    /// Async worker threads
    pub worker_threads: usize,

    /// Upper bound for the elastic blocking pool. Blocking threads are spawned
    /// on demand and retired when idle.
    pub max_blocking_threads: usize,
}

impl PoolConfig {
    pub fn search() -> Self {
        Self {
            thread_name: "trawl-search".to_string(),
            worker_threads: 2,
            max_blocking_threads: 512,
        }
    }

    pub fn collector() -> Self {
        Self {
            thread_name: "trawl-collect".to_string(),
            worker_threads: 2,
            max_blocking_threads: 4,
        }
    }

    pub(crate) fn validate(&self, section: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.thread_name.trim().is_empty() {
            errors.push(ValidationError::new(section, "thread_name cannot be empty"));
        }
        if self.worker_threads == 0 {
            errors.push(ValidationError::new(section, "worker_threads must be at least 1"));
        }
        if self.max_blocking_threads == 0 {
            errors.push(ValidationError::new(
                section,
                "max_blocking_threads must be at least 1",
            ));
        }
        errors
    }
}

/// Result channel cache limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of live keys
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// Budget on queued results summed over every cached channel
    #[serde(default = "default_cache_max_results")]
    pub max_results: usize,
}

fn default_cache_capacity() -> usize {
    256
}

fn default_cache_max_results() -> usize {
    100_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            max_results: default_cache_max_results(),
        }
    }
}

/// Retrieval limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Cap applied to every caller-supplied wait (milliseconds)
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
}

fn default_max_wait_ms() -> u64 {
    2 * 60 * 1000
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_wait_ms: default_max_wait_ms(),
        }
    }
}

impl RetrievalConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    /// Clamp a requested wait to the configured maximum.
    pub fn cap(&self, requested: Duration) -> Duration {
        requested.min(self.max_wait())
    }
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub section: String,
    pub message: String,
}

impl ValidationError {
    fn new(section: &str, message: &str) -> Self {
        Self {
            section: section.to_string(),
            message: message.to_string(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.section, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl TrawlConfig {
    /// Validate the entire configuration, reporting every problem at once
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = self.search.validate("search");
        errors.extend(self.collector.validate("collector"));

        if self.cache.capacity == 0 {
            errors.push(ValidationError::new("cache", "capacity must be at least 1"));
        }
        if self.cache.max_results == 0 {
            errors.push(ValidationError::new("cache", "max_results must be at least 1"));
        }
        if self.retrieval.max_wait_ms == 0 {
            errors.push(ValidationError::new(
                "retrieval",
                "max_wait_ms must be at least 1",
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Load from every source and validate
    pub fn load_validated(project_root: &Path) -> Result<Self, SearchError> {
        let config = ConfigLoader::load(project_root)?;
        config.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            SearchError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(config)
    }

    /// Render as TOML, e.g. to seed a project `trawl.toml`
    pub fn to_toml_string(&self) -> Result<String, SearchError> {
        toml::to_string_pretty(self)
            .map_err(|e| SearchError::ConfigError(format!("Failed to render config: {}", e)))
    }
}

/// Loads [`TrawlConfig`] from layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, then the global file, then `<project_root>/trawl.toml`, then env.
    pub fn load(project_root: &Path) -> Result<TrawlConfig, config::ConfigError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::project_file::add_to_builder(builder, project_root)?;
        let builder = merge::merge_policy::add_env_overrides(builder);
        builder.build()?.try_deserialize()
    }

    /// Defaults plus a single explicit file. No environment overrides.
    pub fn load_from_file(path: &Path) -> Result<TrawlConfig, config::ConfigError> {
        merge::merge_policy::builder_with_defaults()?
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()
    }
}
