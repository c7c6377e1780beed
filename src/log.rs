//! Bounded newest-first logs
//!
//! Both the security event log and the action log share one policy: insert at
//! the head, evict from the tail once capacity is reached. No deduplication,
//! no reordering.

use std::collections::VecDeque;

/// Maximum entries held by a session log
pub const LOG_CAPACITY: usize = 50;

/// Fixed-capacity log, newest entry first
#[derive(Debug, Clone)]
pub struct BoundedLog<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedLog<T> {
    /// Create a log holding at most [`LOG_CAPACITY`] entries
    pub fn new() -> Self {
        Self::with_capacity(LOG_CAPACITY)
    }

    /// Create a log with a custom capacity (at least 1)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert at the head, returning the evicted oldest entry if the log was full
    pub fn push(&mut self, entry: T) -> Option<T> {
        let evicted = if self.entries.len() == self.capacity {
            self.entries.pop_back()
        } else {
            None
        };
        self.entries.push_front(entry);
        evicted
    }

    /// Replace the whole log with a single entry
    pub fn reset(&mut self, entry: T) {
        self.entries.clear();
        self.entries.push_front(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent entry
    pub fn newest(&self) -> Option<&T> {
        self.entries.front()
    }

    /// Oldest retained entry
    pub fn oldest(&self) -> Option<&T> {
        self.entries.back()
    }

    /// Iterate newest first
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }
}

impl<T: Clone> BoundedLog<T> {
    /// Copy the entries out, newest first
    pub fn to_vec(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }
}

impl<T> Default for BoundedLog<T> {
    fn default() -> Self {
        Self::new()
    }
}
