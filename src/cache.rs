//! Channel cache
//!
//! Memoizes one [`ResultChannel`] per key. Entries are evicted least recently used
//! first once either the key capacity or the budget on queued results is
//! exceeded; an evicted key gets a brand-new channel (and a fresh orchestration
//! run) on its next lookup.

use crate::channel::ResultChannel;
use crate::config::CacheConfig;
use crate::error::SearchError;
use lru::LruCache;
use parking_lot::Mutex;
use std::fmt::Debug;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Live entries
    pub entries: usize,
    /// Results currently queued across every live channel
    pub queued_results: usize,
    /// Lookups answered by a live entry
    pub hits: u64,
    /// Lookups that created a new channel
    pub misses: u64,
    /// Entries dropped by capacity or result budget (not by clear/remove)
    pub evictions: u64,
}

pub struct ChannelCache<K: Hash + Eq, R> {
    entries: Mutex<LruCache<K, Arc<ResultChannel<R>>>>,
    max_results: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<K, R> ChannelCache<K, R>
where
    K: Hash + Eq + Clone + Debug,
{
    pub fn new(config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            max_results: config.max_results.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Return the live channel for `key`, or build one with `create`.
    ///
    /// `create` runs under the cache lock, so concurrent callers for one key
    /// always share a single channel. It must not block. On error nothing is
    /// inserted.
    pub fn get_or_create<F>(&self, key: &K, create: F) -> Result<Arc<ResultChannel<R>>, SearchError>
    where
        F: FnOnce(&K) -> Result<Arc<ResultChannel<R>>, SearchError>,
    {
        let mut entries = self.entries.lock();

        let channel = match entries.get(key) {
            Some(channel) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Arc::clone(channel)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                let channel = create(key)?;
                if let Some((evicted, _)) = entries.push(key.clone(), Arc::clone(&channel)) {
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                    debug!(key = ?evicted, "Evicted cache entry over capacity");
                }
                debug!(key = ?key, entries = entries.len(), "Cached new result channel");
                channel
            }
        };

        self.enforce_result_budget(&mut entries);
        Ok(channel)
    }

    /// Drop least recently used entries until the queued results fit the
    /// budget. The most recently used entry is always kept.
    fn enforce_result_budget(&self, entries: &mut LruCache<K, Arc<ResultChannel<R>>>) {
        let mut queued: usize = entries.iter().map(|(_, channel)| channel.len()).sum();
        while queued > self.max_results && entries.len() > 1 {
            let Some((evicted, channel)) = entries.pop_lru() else {
                break;
            };
            queued = queued.saturating_sub(channel.len());
            self.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(
                key = ?evicted,
                queued_results = queued,
                max_results = self.max_results,
                "Evicted cache entry over result budget"
            );
        }
    }

    /// Live channel for `key` without creating one or touching recency.
    pub fn get(&self, key: &K) -> Option<Arc<ResultChannel<R>>> {
        self.entries.lock().peek(key).map(Arc::clone)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.lock().contains(key)
    }

    /// Drop one entry. Returns whether it was present.
    pub fn remove(&self, key: &K) -> bool {
        self.entries.lock().pop(key).is_some()
    }

    /// Drop every entry unconditionally.
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        let dropped = entries.len();
        entries.clear();
        debug!(dropped, "Cleared result channel cache");
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        CacheStats {
            entries: entries.len(),
            queued_results: entries.iter().map(|(_, channel)| channel.len()).sum(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
