//! Search orchestration
//!
//! One orchestration run per key: every root node is evaluated on the search
//! pool, matches are appended to the key's [`ResultChannel`], and each returned
//! child is scheduled as a new evaluation task. There is no depth limit, no
//! visited set, and no back-pressure. Results surface in task completion order.

use crate::channel::ResultChannel;
use crate::error::SearchError;
use crate::model::SearchModel;
use crate::pool::Spawner;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, trace, warn};

/// Orchestration counters, cumulative over the orchestrator's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrchestratorStats {
    /// Orchestration runs started (one per cache miss)
    pub runs: u64,
    /// Evaluation tasks submitted to the search pool
    pub scheduled: u64,
    /// Nodes evaluated successfully
    pub evaluated: u64,
    /// Nodes whose evaluation returned an error or panicked
    pub failed: u64,
    /// Items appended to channels
    pub matched: u64,
    /// Tasks skipped because nobody holds their channel anymore
    pub abandoned: u64,
}

#[derive(Debug, Default)]
struct StatsCounters {
    runs: AtomicU64,
    scheduled: AtomicU64,
    evaluated: AtomicU64,
    failed: AtomicU64,
    matched: AtomicU64,
    abandoned: AtomicU64,
}

impl StatsCounters {
    fn snapshot(&self) -> OrchestratorStats {
        OrchestratorStats {
            runs: self.runs.load(Ordering::Relaxed),
            scheduled: self.scheduled.load(Ordering::Relaxed),
            evaluated: self.evaluated.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            matched: self.matched.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
        }
    }
}

/// Fans evaluation of a forest out over the search pool.
pub struct Orchestrator<M: SearchModel> {
    model: Arc<M>,
    roots: Arc<[M::Node]>,
    spawner: Spawner,
    stats: Arc<StatsCounters>,
}

impl<M: SearchModel> Clone for Orchestrator<M> {
    fn clone(&self) -> Self {
        Self {
            model: Arc::clone(&self.model),
            roots: Arc::clone(&self.roots),
            spawner: self.spawner.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<M: SearchModel> Orchestrator<M> {
    pub fn new(model: Arc<M>, roots: Vec<M::Node>, spawner: Spawner) -> Self {
        Self {
            model,
            roots: roots.into(),
            spawner,
            stats: Arc::new(StatsCounters::default()),
        }
    }

    pub fn model(&self) -> &Arc<M> {
        &self.model
    }

    pub fn roots(&self) -> &[M::Node] {
        &self.roots
    }

    pub fn spawner(&self) -> &Spawner {
        &self.spawner
    }

    pub fn stats(&self) -> OrchestratorStats {
        self.stats.snapshot()
    }

    /// Start an orchestration run for `key` and return its channel.
    ///
    /// Returns as soon as the roots are scheduled; it never waits for results.
    /// Fails only when the search pool no longer accepts new runs.
    pub fn run_search(&self, key: &M::Key) -> Result<Arc<ResultChannel<M::Item>>, SearchError> {
        if self.spawner.is_closed() {
            return Err(SearchError::PoolShutdown(self.spawner.name().to_string()));
        }

        let channel = Arc::new(ResultChannel::new());
        let run = Arc::new(Run {
            model: Arc::clone(&self.model),
            key: key.clone(),
            channel: Arc::downgrade(&channel),
            spawner: self.spawner.clone(),
            stats: Arc::clone(&self.stats),
        });

        self.stats.runs.fetch_add(1, Ordering::Relaxed);
        for root in self.roots.iter() {
            run.schedule(root.clone());
        }

        debug!(key = ?key, roots = self.roots.len(), "Started orchestration run");
        Ok(channel)
    }
}

/// State shared by every task of one orchestration run
struct Run<M: SearchModel> {
    model: Arc<M>,
    key: M::Key,
    channel: Weak<ResultChannel<M::Item>>,
    spawner: Spawner,
    stats: Arc<StatsCounters>,
}

impl<M: SearchModel> Run<M> {
    fn schedule(self: &Arc<Self>, node: M::Node) {
        let run = Arc::clone(self);
        match self.spawner.spawn_blocking(move || run.evaluate(node)) {
            Ok(_) => {
                self.stats.scheduled.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                debug!(key = ?self.key, error = %e, "Dropping node, search pool is shut down");
            }
        }
    }

    fn evaluate(self: Arc<Self>, node: M::Node) {
        if self.spawner.is_cancelled() {
            trace!(key = ?self.key, node = ?node, "Skipping node after immediate shutdown");
            return;
        }
        let Some(channel) = self.channel.upgrade() else {
            self.stats.abandoned.fetch_add(1, Ordering::Relaxed);
            trace!(key = ?self.key, node = ?node, "Channel dropped, abandoning branch");
            return;
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| self.model.evaluate(&self.key, &node)));
        match outcome {
            Ok(Ok(outcome)) => {
                self.stats.evaluated.fetch_add(1, Ordering::Relaxed);
                if !outcome.matches.is_empty() {
                    let matched = outcome.matches.len();
                    trace!(key = ?self.key, node = ?node, matches = matched, "Node matched");
                    // Count only once the items are visible in the channel
                    channel.push_all(outcome.matches);
                    self.stats
                        .matched
                        .fetch_add(matched as u64, Ordering::Relaxed);
                }
                drop(channel);
                for child in outcome.children {
                    self.schedule(child);
                }
            }
            Ok(Err(e)) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(key = ?self.key, node = ?node, error = %e, "Node evaluation failed");
            }
            Err(payload) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    key = ?self.key,
                    node = ?node,
                    panic = %panic_message(payload.as_ref()),
                    "Node evaluation panicked"
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
