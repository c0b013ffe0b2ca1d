//! Change History
//!
//! Keeps the most recent `LevelChange`s in memory, oldest evicted first.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::logic::events::LevelChange;

/// Bounded in-memory log of the most recent level changes.
pub struct ChangeHistory {
    capacity: usize,
    entries: Mutex<VecDeque<LevelChange>>,
}

impl ChangeHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn record(&self, change: LevelChange) {
        let mut guard = self.entries.lock();
        if guard.len() == self.capacity {
            guard.pop_front();
        }
        guard.push_back(change);
    }

    /// Newest first
    pub fn recent(&self, limit: usize) -> Vec<LevelChange> {
        self.entries.lock().iter().rev().take(limit).cloned().collect()
    }

    pub fn all(&self) -> Vec<LevelChange> {
        self.recent(self.capacity)
    }

    pub fn last(&self) -> Option<LevelChange> {
        self.entries.lock().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
