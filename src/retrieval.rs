//! Retrieval policies
//!
//! Every policy looks the key up in the cache (starting a search on a miss),
//! removes items from the key's channel under its stop condition, and pushes
//! every removed item back before handing copies to the caller. Waits are capped
//! at [`RetrievalConfig::max_wait`](crate::config::RetrievalConfig::max_wait).
//!
//! | Method | Stops when | Waiting |
//! |---|---|---|
//! | [`channel`](SearchEngine::channel) | n/a | caller drains the channel |
//! | [`until_gap_timeout`](SearchEngine::until_gap_timeout) | a gap | bounded waits |
//! | [`until_timeout`](SearchEngine::until_timeout) | deadline | collector race |
//! | `until_count_or_timeout` | count, deadline | collector race |
//! | `until_count_or_gap_timeout` | count, a gap | bounded waits |
//! | [`until_count`](SearchEngine::until_count) | count | unbounded waits |
//! | [`first`](SearchEngine::first) | one item | one unbounded wait |
//! | [`first_within`](SearchEngine::first_within) | one item, deadline | collector race |
//!
//! A gap is one wait for the next item exceeding the given duration. A collector
//! race runs a background collector on the collector pool against the deadline.
//!
//! Interruption ([`SearchEngine::interrupt_retrievals`]) stops any of them early
//! with whatever was collected so far.

use crate::channel::ResultChannel;
use crate::config::RetrievalConfig;
use crate::engine::SearchEngine;
use crate::error::SearchError;
use crate::model::SearchModel;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Parameters of one retrieval call. Built fresh per call, never shared.
#[derive(Debug)]
pub struct RetrievalRule<R> {
    pub channel: Arc<ResultChannel<R>>,
    /// Effective wait, already capped
    pub wait: Duration,
    /// Target count (`usize::MAX` when unbounded)
    pub count: usize,
    /// Cancelled when the call must stop early
    pub interrupt: CancellationToken,
}

impl<R> RetrievalRule<R> {
    pub fn new(
        channel: Arc<ResultChannel<R>>,
        requested_wait: Duration,
        count: usize,
        limits: &RetrievalConfig,
        interrupt: CancellationToken,
    ) -> Self {
        Self {
            channel,
            wait: limits.cap(requested_wait),
            count,
            interrupt,
        }
    }
}

/// Items removed from a channel. Dropping it pushes them back, so items are
/// republished on every exit path, including a caller abandoning the future.
struct Drained<R: Clone> {
    channel: Arc<ResultChannel<R>>,
    items: Vec<R>,
}

impl<R: Clone> Drained<R> {
    fn new(channel: Arc<ResultChannel<R>>) -> Self {
        Self {
            channel,
            items: Vec::new(),
        }
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    /// Republish and hand back copies.
    fn finish(self) -> Vec<R> {
        self.items.clone()
    }
}

impl<R: Clone> Drop for Drained<R> {
    fn drop(&mut self) {
        self.channel.push_all(self.items.drain(..));
    }
}

/// Unbounded takes until `limit` items or cancellation. The token is checked
/// before every wait and the wait itself is abandoned on cancellation.
async fn take_until<R: Clone>(drained: &mut Drained<R>, limit: usize, cancel: &CancellationToken) {
    let channel = Arc::clone(&drained.channel);
    while drained.len() < limit {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            item = channel.take() => drained.items.push(item),
        }
    }
}

/// Bounded takes until `limit` items, one wait exceeding `gap`, or cancellation.
async fn take_until_gap<R: Clone>(
    drained: &mut Drained<R>,
    limit: usize,
    gap: Duration,
    cancel: &CancellationToken,
) {
    let channel = Arc::clone(&drained.channel);
    while drained.len() < limit {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = channel.take_timeout(gap) => match next {
                Some(item) => drained.items.push(item),
                None => break,
            },
        }
    }
}

/// Background half of a deadline race.
async fn collect<R: Clone>(
    channel: Arc<ResultChannel<R>>,
    limit: usize,
    cancel: CancellationToken,
    reply: oneshot::Sender<Vec<R>>,
) {
    let mut drained = Drained::new(channel);
    take_until(&mut drained, limit, &cancel).await;
    // A closed receiver means the caller went away; the items are already back.
    let _ = reply.send(drained.finish());
}

impl<M: SearchModel> SearchEngine<M> {
    /// The key's channel itself. Items the caller removes are not republished.
    pub fn channel(&self, key: &M::Key) -> Result<Arc<ResultChannel<M::Item>>, SearchError> {
        self.channel_for(key)
    }

    fn rule(
        &self,
        key: &M::Key,
        wait: Duration,
        count: usize,
    ) -> Result<RetrievalRule<M::Item>, SearchError> {
        let channel = self.channel_for(key)?;
        Ok(RetrievalRule::new(
            channel,
            wait,
            count,
            self.retrieval_config(),
            self.interrupt_token(),
        ))
    }

    /// Race a background collector against the rule's deadline.
    async fn race_deadline(
        &self,
        rule: &RetrievalRule<M::Item>,
    ) -> Result<Vec<M::Item>, SearchError> {
        let cancel = rule.interrupt.child_token();
        // Stop the collector if this future is dropped mid-race.
        let _abandon = cancel.clone().drop_guard();
        let (reply, mut received) = oneshot::channel();

        self.collectors()
            .spawn(collect(Arc::clone(&rule.channel), rule.count, cancel.clone(), reply))?;

        let outcome = tokio::select! {
            items = &mut received => items,
            _ = tokio::time::sleep(rule.wait) => {
                cancel.cancel();
                received.await
            }
        };
        outcome.map_err(|_| {
            SearchError::Collector("collector exited without reporting".to_string())
        })
    }

    /// Collect until a single wait for the next item exceeds `gap`.
    pub async fn until_gap_timeout(
        &self,
        key: &M::Key,
        gap: Duration,
    ) -> Result<Vec<M::Item>, SearchError> {
        self.until_count_or_gap_timeout(key, usize::MAX, gap).await
    }

    /// Collect everything that arrives before the deadline.
    pub async fn until_timeout(
        &self,
        key: &M::Key,
        timeout: Duration,
    ) -> Result<Vec<M::Item>, SearchError> {
        self.until_count_or_timeout(key, usize::MAX, timeout).await
    }

    /// Collect until `count` items arrive or the deadline passes, whichever is first.
    pub async fn until_count_or_timeout(
        &self,
        key: &M::Key,
        count: usize,
        timeout: Duration,
    ) -> Result<Vec<M::Item>, SearchError> {
        let started = Instant::now();
        let rule = self.rule(key, timeout, count)?;
        if count == 0 {
            return Ok(Vec::new());
        }

        let items = self.race_deadline(&rule).await?;
        debug!(
            key = ?key,
            count = ?(count != usize::MAX).then_some(count),
            wait_ms = rule.wait.as_millis() as u64,
            collected = items.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Deadline retrieval finished"
        );
        Ok(items)
    }

    /// Collect until `count` items arrive or a single wait exceeds `gap`.
    pub async fn until_count_or_gap_timeout(
        &self,
        key: &M::Key,
        count: usize,
        gap: Duration,
    ) -> Result<Vec<M::Item>, SearchError> {
        let started = Instant::now();
        let rule = self.rule(key, gap, count)?;
        let mut drained = Drained::new(Arc::clone(&rule.channel));
        take_until_gap(&mut drained, rule.count, rule.wait, &rule.interrupt).await;

        let items = drained.finish();
        debug!(
            key = ?key,
            gap_ms = rule.wait.as_millis() as u64,
            collected = items.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            interrupted = rule.interrupt.is_cancelled(),
            "Gap retrieval finished"
        );
        Ok(items)
    }

    /// Collect exactly `count` items, waiting as long as it takes.
    ///
    /// Only returns fewer than `count` items when interrupted.
    pub async fn until_count(
        &self,
        key: &M::Key,
        count: usize,
    ) -> Result<Vec<M::Item>, SearchError> {
        let rule = self.rule(key, Duration::ZERO, count)?;
        let mut drained = Drained::new(Arc::clone(&rule.channel));
        take_until(&mut drained, rule.count, &rule.interrupt).await;

        let items = drained.finish();
        debug!(key = ?key, count, collected = items.len(), "Count retrieval finished");
        Ok(items)
    }

    /// One item, waiting as long as it takes.
    ///
    /// Returns [`SearchError::Interrupted`] if interrupted first.
    pub async fn first(&self, key: &M::Key) -> Result<M::Item, SearchError> {
        self.until_count(key, 1)
            .await?
            .pop()
            .ok_or(SearchError::Interrupted)
    }

    /// One item, or [`SearchError::TimedOut`] once the deadline passes.
    ///
    /// Returns [`SearchError::Interrupted`] if interrupted first.
    pub async fn first_within(
        &self,
        key: &M::Key,
        timeout: Duration,
    ) -> Result<M::Item, SearchError> {
        let rule = self.rule(key, timeout, 1)?;
        let mut items = self.race_deadline(&rule).await?;
        match items.pop() {
            Some(item) => Ok(item),
            None if rule.interrupt.is_cancelled() => Err(SearchError::Interrupted),
            None => {
                debug!(
                    key = ?key,
                    wait_ms = rule.wait.as_millis() as u64,
                    "Single retrieval timed out"
                );
                Err(SearchError::TimedOut { waited: rule.wait })
            }
        }
    }
}
