//! Search engine
//!
//! Wires a [`SearchModel`] and its root nodes to the search pool, the channel
//! cache, and the collector pool. Retrieval policies live in
//! [`retrieval`](crate::retrieval); this module covers construction, the
//! mutation gateway, cache control, and lifecycle.

use crate::cache::{CacheStats, ChannelCache};
use crate::channel::ResultChannel;
use crate::config::{RetrievalConfig, TrawlConfig};
use crate::error::SearchError;
use crate::model::SearchModel;
use crate::orchestrator::{Orchestrator, OrchestratorStats};
use crate::pool::{Spawner, WorkerPool};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Concurrent cached search over a forest of nodes.
pub struct SearchEngine<M: SearchModel> {
    orchestrator: Orchestrator<M>,
    cache: Arc<ChannelCache<M::Key, M::Item>>,
    search_pool: Arc<WorkerPool>,
    collector_pool: Arc<WorkerPool>,
    retrieval: RetrievalConfig,
    interrupt: RwLock<CancellationToken>,
}

impl<M: SearchModel> SearchEngine<M> {
    /// Build an engine with its own pools and cache.
    pub fn new(model: M, roots: Vec<M::Node>, config: &TrawlConfig) -> Result<Self, SearchError> {
        config.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            SearchError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;

        let search_pool = Arc::new(WorkerPool::new(&config.search)?);
        let collector_pool = Arc::new(WorkerPool::new(&config.collector)?);
        let cache = Arc::new(ChannelCache::new(&config.cache));

        Ok(Self::with_parts(
            Arc::new(model),
            roots,
            cache,
            search_pool,
            collector_pool,
            config.retrieval.clone(),
        ))
    }

    /// Build an engine on caller-supplied pools and cache.
    ///
    /// Pools may be shared between engines; shutting one engine's search pool
    /// down affects every engine using it.
    pub fn with_parts(
        model: Arc<M>,
        roots: Vec<M::Node>,
        cache: Arc<ChannelCache<M::Key, M::Item>>,
        search_pool: Arc<WorkerPool>,
        collector_pool: Arc<WorkerPool>,
        retrieval: RetrievalConfig,
    ) -> Self {
        info!(
            roots = roots.len(),
            search_pool = search_pool.name(),
            collector_pool = collector_pool.name(),
            max_wait_ms = retrieval.max_wait_ms,
            "Search engine ready"
        );
        Self {
            orchestrator: Orchestrator::new(model, roots, search_pool.spawner()),
            cache,
            search_pool,
            collector_pool,
            retrieval,
            interrupt: RwLock::new(CancellationToken::new()),
        }
    }

    pub fn model(&self) -> &Arc<M> {
        self.orchestrator.model()
    }

    pub fn roots(&self) -> &[M::Node] {
        self.orchestrator.roots()
    }

    pub fn cache(&self) -> &Arc<ChannelCache<M::Key, M::Item>> {
        &self.cache
    }

    pub fn retrieval_config(&self) -> &RetrievalConfig {
        &self.retrieval
    }

    pub fn search_stats(&self) -> OrchestratorStats {
        self.orchestrator.stats()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Cached channel for `key`, starting an orchestration run on a miss.
    pub(crate) fn channel_for(
        &self,
        key: &M::Key,
    ) -> Result<Arc<ResultChannel<M::Item>>, SearchError> {
        self.cache
            .get_or_create(key, |key| self.orchestrator.run_search(key))
    }

    pub(crate) fn collectors(&self) -> Spawner {
        self.collector_pool.spawner()
    }

    /// Token for one retrieval call; cancelled by [`Self::interrupt_retrievals`].
    pub(crate) fn interrupt_token(&self) -> CancellationToken {
        self.interrupt.read().child_token()
    }

    /// Stop every in-flight retrieval. Each returns what it collected so far.
    /// Retrievals started afterwards are unaffected.
    pub fn interrupt_retrievals(&self) {
        let previous = std::mem::replace(&mut *self.interrupt.write(), CancellationToken::new());
        previous.cancel();
        debug!("Interrupted in-flight retrievals");
    }

    /// Add `item` to the domain; on success every cached result is dropped.
    pub fn add(&self, item: &M::Item) -> Result<bool, SearchError> {
        let changed = self.model().add(item)?;
        self.invalidate_if(changed, "add", item);
        Ok(changed)
    }

    /// Remove `item` from the domain; on success every cached result is dropped.
    pub fn remove(&self, item: &M::Item) -> Result<bool, SearchError> {
        let changed = self.model().remove(item)?;
        self.invalidate_if(changed, "remove", item);
        Ok(changed)
    }

    fn invalidate_if(&self, changed: bool, operation: &str, item: &M::Item) {
        if changed {
            self.cache.clear();
            info!(operation, item = ?item, "Domain changed, cache invalidated");
        } else {
            debug!(operation, item = ?item, "Domain unchanged, cache kept");
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn is_cache_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Graceful shutdown of the search pool: no new orchestration runs start;
    /// runs already in flight finish their traversal.
    pub fn stop_search(&self) {
        self.search_pool.close();
    }

    /// Immediate shutdown of the search pool: queued evaluations are skipped,
    /// no further nodes are scheduled, and in-flight retrievals are interrupted.
    pub fn stop_search_now(&self) {
        self.search_pool.shutdown_now();
        self.interrupt_retrievals();
    }

    pub fn is_search_stopped(&self) -> bool {
        self.search_pool.is_closed()
    }

    /// Resolves once the search pool is stopped and every evaluation finished.
    pub async fn wait_search_idle(&self) {
        self.search_pool.wait_idle().await;
    }
}
