//! Concurrent, observable FIFO work queue.
//!
//! One generic type backs both the container queue (outer walk → inner
//! workers) and the download target queue (discovery → download workers).
//! Consumers poll with a fixed sleep when empty; there is no blocking
//! wake-up, which keeps the type trivial and is acceptable latency-wise.

use std::collections::VecDeque;
use std::sync::Mutex;

/// Unbounded multi-producer multi-consumer FIFO queue.
#[derive(Debug)]
pub struct WorkQueue<T> {
    items: Mutex<VecDeque<T>>,
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WorkQueue<T> {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<T>> {
        // Recover from poisoning: the queue holds plain data and stays
        // consistent even if a holder panicked.
        self.items
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Appends an item at the back.
    pub fn push(&self, item: T) {
        self.lock().push_back(item);
    }

    /// Removes and returns the front item, or `None` when empty.
    pub fn pop(&self) -> Option<T> {
        self.lock().pop_front()
    }

    /// Number of items currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when no items are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
