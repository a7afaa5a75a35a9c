//! Bounded admission queue between producers and the pump.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::Duration;

/// FIFO queue with a hard capacity.
///
/// Producers never wait: `try_push` hands the item back when the queue is
/// full. The consumer side waits on a condition variable for at most the
/// poll interval so shutdown is observed promptly.
pub struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    ready: Condvar,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Creates an empty queue holding at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            ready: Condvar::new(),
            capacity,
        }
    }

    /// Maximum number of queued items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of queued items.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Returns `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Appends `item` unless the queue is full, in which case it is returned.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        let mut items = self.items.lock();
        if items.len() >= self.capacity {
            return Err(item);
        }
        items.push_back(item);
        drop(items);
        self.ready.notify_one();
        Ok(())
    }

    /// Pops the oldest item, waiting up to `timeout` for one to arrive.
    pub fn poll(&self, timeout: Duration) -> Option<T> {
        let mut items = self.items.lock();
        if items.is_empty() {
            // Spurious and shutdown wake-ups fall through to a plain pop.
            let _ = self.ready.wait_for(&mut items, timeout);
        }
        items.pop_front()
    }

    /// Wakes every waiting consumer without enqueuing anything.
    pub fn wake_all(&self) {
        self.ready.notify_all();
    }

    /// Removes and returns everything still queued, oldest first.
    pub fn drain(&self) -> Vec<T> {
        self.items.lock().drain(..).collect()
    }
}

impl<T: Clone> BoundedQueue<T> {
    /// Copies the queued items, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        self.items.lock().iter().cloned().collect()
    }
}
