//! Error types for the trawl search engine.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a [`SearchModel`](crate::model::SearchModel) implementation.
///
/// These are node-local: the orchestrator logs them and moves on, they never
/// reach a retrieval caller.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Node cannot be evaluated: {0}")]
    InvalidNode(String),

    #[error("Model error: {0}")]
    Other(String),
}

/// Filesystem errors raised while preparing search roots
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid path {path:?}: {source}")]
    InvalidPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors surfaced by the public search API
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Worker pool '{0}' has been shut down")]
    PoolShutdown(String),

    #[error("Failed to start worker pool '{pool}': {source}")]
    PoolStart {
        pool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out after {waited:?} without a result")]
    TimedOut { waited: Duration },

    #[error("Retrieval interrupted before a result arrived")]
    Interrupted,

    #[error("Background collector failed: {0}")]
    Collector(String),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<config::ConfigError> for SearchError {
    fn from(err: config::ConfigError) -> Self {
        SearchError::ConfigError(err.to_string())
    }
}

impl SearchError {
    /// True for the two "no result" outcomes of single-result retrieval.
    pub fn is_no_result(&self) -> bool {
        matches!(self, SearchError::TimedOut { .. } | SearchError::Interrupted)
    }
}
