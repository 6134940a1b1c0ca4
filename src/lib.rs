//! Trawl: Concurrent Cached Search
//!
//! Fans the evaluation of a forest of nodes out over a worker pool, streams matches
//! into one result channel per key, and serves those channels from a cache through
//! a family of retrieval policies (by count, by deadline, by inter-arrival gap).

pub mod cache;
pub mod channel;
pub mod config;
pub mod engine;
pub mod error;
pub mod fs;
pub mod logging;
pub mod model;
pub mod orchestrator;
pub mod pool;
pub mod retrieval;

pub use channel::ResultChannel;
pub use config::TrawlConfig;
pub use engine::SearchEngine;
pub use error::{ModelError, SearchError};
pub use fs::FsSearchModel;
pub use model::{SearchModel, SearchOutcome};
