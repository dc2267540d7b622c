//! Deduplicating work queue drained in fixed-size batches.

use std::collections::VecDeque;
use std::hash::Hash;

use hashbrown::HashSet;

/// Insertion-ordered queue that holds each item at most once.
#[derive(Clone, Debug)]
pub struct BatchedQueue<T> {
    order: VecDeque<T>,
    queued: HashSet<T>,
}

impl<T> Default for BatchedQueue<T> {
    fn default() -> Self {
        Self {
            order: VecDeque::new(),
            queued: HashSet::new(),
        }
    }
}

impl<T: Hash + Eq + Clone> BatchedQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an item. Returns false if it was already queued.
    pub fn push(&mut self, item: T) -> bool {
        if !self.queued.insert(item.clone()) {
            return false;
        }
        self.order.push_back(item);
        true
    }

    /// Enqueue several items, returning how many were new.
    pub fn extend(&mut self, items: impl IntoIterator<Item = T>) -> usize {
        items
            .into_iter()
            .map(|item| self.push(item))
            .filter(|added| *added)
            .count()
    }

    pub fn contains(&self, item: &T) -> bool {
        self.queued.contains(item)
    }

    /// Remove up to `max` items from the front.
    pub fn drain_batch(&mut self, max: usize) -> Vec<T> {
        let count = max.min(self.order.len());
        let batch: Vec<T> = self.order.drain(..count).collect();
        for item in &batch {
            self.queued.remove(item);
        }
        batch
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
