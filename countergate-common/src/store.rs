//! Read side of the counter aggregation buffer.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::counter::Counter;

/// Access to the counters currently held by an aggregation buffer.
///
/// Implementations must make [`CounterStore::get_all_and_reset`] atomic with
/// respect to concurrent writers: the returned snapshot holds the values
/// from before the clear.
pub trait CounterStore: Send + Sync {
    /// All buffered counters in buffer order. The buffer is left unchanged.
    fn get_all(&self) -> Vec<Counter>;

    /// Reset every buffered counter to its unset state.
    fn clear_all(&self);

    /// Snapshot all counters, then reset them, as one step.
    fn get_all_and_reset(&self) -> Vec<Counter>;
}

/// Shareable store handle.
pub type SharedCounterStore = Arc<dyn CounterStore>;

/// Insertion-ordered in-memory counter store.
///
/// Holds already aggregated records; `record` replaces the previous record
/// with the same name in place.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    counters: RwLock<Vec<Counter>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a counter by name.
    pub fn record(&self, counter: Counter) {
        let mut counters = self.counters.write();
        match counters.iter_mut().find(|c| c.name == counter.name) {
            Some(existing) => *existing = counter,
            None => counters.push(counter),
        }
    }

    /// Look up a counter by name.
    pub fn get(&self, name: &str) -> Option<Counter> {
        self.counters.read().iter().find(|c| c.name == name).cloned()
    }

    pub fn len(&self) -> usize {
        self.counters.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.read().is_empty()
    }
}

impl CounterStore for MemoryCounterStore {
    fn get_all(&self) -> Vec<Counter> {
        self.counters.read().clone()
    }

    fn clear_all(&self) {
        for counter in self.counters.write().iter_mut() {
            counter.reset();
        }
    }

    fn get_all_and_reset(&self) -> Vec<Counter> {
        let mut counters = self.counters.write();
        let snapshot = counters.clone();
        for counter in counters.iter_mut() {
            counter.reset();
        }
        trace!(counters = snapshot.len(), "Counters read and reset");
        snapshot
    }
}
