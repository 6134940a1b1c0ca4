//! Result channel
//!
//! Unbounded multi-producer multi-consumer FIFO holding the results of one key.
//! Orchestration tasks push from blocking threads; retrievals take from async
//! contexts and push what they took back afterwards.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tokio::sync::Notify;

pub struct ResultChannel<R> {
    items: Mutex<VecDeque<R>>,
    notify: Notify,
}

impl<R> Default for ResultChannel<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for ResultChannel<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultChannel")
            .field("len", &self.len())
            .finish()
    }
}

impl<R> ResultChannel<R> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    /// Append one item and wake every waiting consumer.
    pub fn push(&self, item: R) {
        self.items.lock().push_back(item);
        self.notify.notify_waiters();
    }

    /// Append items in order. Used to republish what a retrieval removed.
    pub fn push_all(&self, items: impl IntoIterator<Item = R>) {
        let pushed = {
            let mut queue = self.items.lock();
            let before = queue.len();
            queue.extend(items);
            queue.len() > before
        };
        if pushed {
            self.notify.notify_waiters();
        }
    }

    /// Remove the head of the queue without waiting.
    pub fn try_take(&self) -> Option<R> {
        self.items.lock().pop_front()
    }

    /// Wait until an item is available and remove it.
    ///
    /// Cancel safe: dropping the future never loses an item, because an item is
    /// only removed on the poll that returns it.
    pub async fn take(&self) -> R {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before re-checking so a push between the check and the
            // await still wakes us.
            notified.as_mut().enable();

            if let Some(item) = self.try_take() {
                return item;
            }
            notified.await;
        }
    }

    /// Wait at most `timeout` for an item. `None` means the wait elapsed.
    pub async fn take_timeout(&self, timeout: Duration) -> Option<R> {
        tokio::time::timeout(timeout, self.take()).await.ok()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl<R: Clone> ResultChannel<R> {
    /// Copy of the queued items in FIFO order, leaving the queue untouched.
    pub fn snapshot(&self) -> Vec<R> {
        self.items.lock().iter().cloned().collect()
    }
}
