//! Merge rules: defaults, override order, conflict handling.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment};

/// Prefix for environment overrides, e.g. `TRAWL__CACHE__CAPACITY=64`.
pub const ENV_PREFIX: &str = "TRAWL";

/// Separator between nested keys in environment overrides.
pub const ENV_SEPARATOR: &str = "__";

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("search.thread_name", "trawl-search")?
        .set_default("search.worker_threads", 2)?
        .set_default("search.max_blocking_threads", 512)?
        .set_default("collector.thread_name", "trawl-collect")?
        .set_default("collector.worker_threads", 2)?
        .set_default("collector.max_blocking_threads", 4)?
        .set_default("cache.capacity", 256)?
        .set_default("cache.max_results", 100_000)?
        .set_default("retrieval.max_wait_ms", 120_000)
}

/// Environment overrides always win over every file source.
pub fn add_env_overrides(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    )
}
