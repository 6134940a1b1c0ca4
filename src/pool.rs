//! Worker pools
//!
//! Each pool owns a dedicated multi-threaded tokio runtime. Blocking work lands on
//! the runtime's elastic blocking pool (threads spawned on demand, retired when
//! idle); async work lands on its worker threads. Every task is tracked so a
//! graceful shutdown can wait for in-flight work to drain.

use crate::config::PoolConfig;
use crate::error::SearchError;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, trace};

/// How long an idle blocking thread lingers before it is retired
const BLOCKING_KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Cheap, cloneable handle for submitting work to a [`WorkerPool`].
///
/// Tasks that spawn further tasks hold a `Spawner` rather than the pool itself,
/// so the runtime is never dropped from one of its own threads.
#[derive(Debug, Clone)]
pub struct Spawner {
    name: Arc<str>,
    handle: Handle,
    tracker: TaskTracker,
    cancel: CancellationToken,
    closed: Arc<AtomicBool>,
}

impl Spawner {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once the pool stopped accepting new top-level work.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.cancel.is_cancelled()
    }

    /// True once the pool was shut down immediately (or dropped).
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Spawn an async task on the pool.
    pub fn spawn<F>(&self, fut: F) -> Result<JoinHandle<F::Output>, SearchError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if self.cancel.is_cancelled() {
            return Err(SearchError::PoolShutdown(self.name.to_string()));
        }
        trace!(pool = %self.name, "pool.spawn");
        Ok(self.tracker.spawn_on(fut, &self.handle))
    }

    /// Spawn blocking work on the pool's elastic blocking threads.
    pub fn spawn_blocking<F, R>(&self, f: F) -> Result<JoinHandle<R>, SearchError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.cancel.is_cancelled() {
            return Err(SearchError::PoolShutdown(self.name.to_string()));
        }
        trace!(pool = %self.name, "pool.spawn_blocking");
        Ok(self.tracker.spawn_blocking_on(f, &self.handle))
    }

    /// Number of tracked tasks that have not finished yet.
    pub fn active_tasks(&self) -> usize {
        self.tracker.len()
    }
}

/// A named worker pool with graceful and immediate shutdown.
pub struct WorkerPool {
    spawner: Spawner,
    runtime: Option<Runtime>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.spawner.name)
            .field("active_tasks", &self.spawner.active_tasks())
            .field("closed", &self.spawner.is_closed())
            .finish()
    }
}

impl WorkerPool {
    /// Build a pool with its own runtime. Rejects zero-sized pools.
    pub fn new(config: &PoolConfig) -> Result<Self, SearchError> {
        let errors = config.validate("pool");
        if !errors.is_empty() {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            return Err(SearchError::ConfigError(format!(
                "Invalid pool configuration for '{}':\n{}",
                config.thread_name,
                error_msgs.join("\n")
            )));
        }

        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .max_blocking_threads(config.max_blocking_threads)
            .thread_keep_alive(BLOCKING_KEEP_ALIVE)
            .thread_name(config.thread_name.clone())
            .enable_all()
            .build()
            .map_err(|source| SearchError::PoolStart {
                pool: config.thread_name.clone(),
                source,
            })?;

        info!(
            pool = %config.thread_name,
            worker_threads = config.worker_threads,
            max_blocking_threads = config.max_blocking_threads,
            "Started worker pool"
        );

        Ok(Self {
            spawner: Spawner {
                name: Arc::from(config.thread_name.as_str()),
                handle: runtime.handle().clone(),
                tracker: TaskTracker::new(),
                cancel: CancellationToken::new(),
                closed: Arc::new(AtomicBool::new(false)),
            },
            runtime: Some(runtime),
        })
    }

    pub fn name(&self) -> &str {
        self.spawner.name()
    }

    pub fn spawner(&self) -> Spawner {
        self.spawner.clone()
    }

    pub fn spawn<F>(&self, fut: F) -> Result<JoinHandle<F::Output>, SearchError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.spawner.spawn(fut)
    }

    pub fn spawn_blocking<F, R>(&self, f: F) -> Result<JoinHandle<R>, SearchError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.spawner.spawn_blocking(f)
    }

    pub fn is_closed(&self) -> bool {
        self.spawner.is_closed()
    }

    pub fn is_cancelled(&self) -> bool {
        self.spawner.is_cancelled()
    }

    pub fn active_tasks(&self) -> usize {
        self.spawner.active_tasks()
    }

    /// Graceful shutdown: refuse new top-level work, let tracked tasks finish.
    pub fn close(&self) {
        if !self.spawner.closed.swap(true, Ordering::AcqRel) {
            self.spawner.tracker.close();
            info!(
                pool = %self.spawner.name,
                active_tasks = self.spawner.active_tasks(),
                "Worker pool closed"
            );
        }
    }

    /// Immediate shutdown: close and cancel. Queued tasks observe the token
    /// and exit without doing their work.
    pub fn shutdown_now(&self) {
        self.close();
        if !self.spawner.cancel.is_cancelled() {
            self.spawner.cancel.cancel();
            info!(pool = %self.spawner.name, "Worker pool cancelled");
        }
    }

    /// Wait until the pool is closed and every tracked task has finished.
    ///
    /// Never resolves on a pool that has not been closed.
    pub async fn wait_idle(&self) {
        self.spawner.tracker.wait().await;
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.spawner.cancel.cancel();
        if let Some(runtime) = self.runtime.take() {
            // Non-blocking, so dropping a pool from async code is fine.
            runtime.shutdown_background();
        }
    }
}
