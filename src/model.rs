//! Search capability contract
//!
//! A [`SearchModel`] decides what matches a key and how a node expands. The engine
//! never inspects keys, nodes, or items itself; it only routes them.

use crate::error::ModelError;
use std::fmt::Debug;
use std::hash::Hash;

/// Outcome of evaluating one node for one key.
///
/// Both lists may be empty; a node with neither matches nor children is a dead end.
/// Matched items are not deduplicated anywhere downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome<I, N> {
    pub matches: Vec<I>,
    pub children: Vec<N>,
}

impl<I, N> Default for SearchOutcome<I, N> {
    fn default() -> Self {
        Self {
            matches: Vec::new(),
            children: Vec::new(),
        }
    }
}

impl<I, N> SearchOutcome<I, N> {
    pub fn dead_end() -> Self {
        Self::default()
    }

    pub fn matched(matches: Vec<I>) -> Self {
        Self {
            matches,
            children: Vec::new(),
        }
    }

    pub fn expand(children: Vec<N>) -> Self {
        Self {
            matches: Vec::new(),
            children,
        }
    }

    pub fn with_matches(mut self, matches: impl IntoIterator<Item = I>) -> Self {
        self.matches.extend(matches);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = N>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn is_dead_end(&self) -> bool {
        self.matches.is_empty() && self.children.is_empty()
    }
}

/// Domain-specific matching and mutation.
///
/// `evaluate` runs on the search pool's blocking threads, so it may perform
/// synchronous I/O. The engine does no cycle detection: a model over a cyclic
/// graph must avoid handing back nodes it has already expanded.
pub trait SearchModel: Send + Sync + 'static {
    /// Query identity; also the cache key
    type Key: Clone + Eq + Hash + Debug + Send + Sync + 'static;
    /// Unit of the search space
    type Node: Clone + Debug + Send + Sync + 'static;
    /// Value produced by a match
    type Item: Clone + Debug + Send + Sync + 'static;

    /// Evaluate `node` against `key`.
    fn evaluate(
        &self,
        key: &Self::Key,
        node: &Self::Node,
    ) -> Result<SearchOutcome<Self::Item, Self::Node>, ModelError>;

    /// Add `item` to the underlying domain. `Ok(true)` means the domain changed.
    fn add(&self, item: &Self::Item) -> Result<bool, ModelError>;

    /// Remove `item` from the underlying domain. `Ok(true)` means the domain changed.
    fn remove(&self, item: &Self::Item) -> Result<bool, ModelError>;
}
