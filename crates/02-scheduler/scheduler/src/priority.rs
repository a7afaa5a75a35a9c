use intent::IntentPriority;
use log::trace;
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::metrics::{MetricsTracker, SchedulerMetrics};
use crate::process::Process;
use crate::strategy::Scheduler;

const BUCKETS: usize = IntentPriority::DESCENDING.len();

/// Fixed set of priority buckets (Critical ≻ High ≻ Normal ≻ Low ≻ Deferred)
/// with O(1) enqueue/dequeue.
#[derive(Debug)]
pub struct PQueues<T> {
    buckets: [VecDeque<T>; BUCKETS],
}

impl<T> Default for PQueues<T> {
    fn default() -> Self {
        Self {
            buckets: std::array::from_fn(|_| VecDeque::new()),
        }
    }
}

impl<T> PQueues<T> {
    /// Creates empty priority queues with default capacity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates empty priority queues with an initial capacity per bucket.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buckets: std::array::from_fn(|_| VecDeque::with_capacity(capacity)),
        }
    }

    /// Returns `true` when every bucket is empty.
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(VecDeque::is_empty)
    }

    /// Total number of queued items.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(VecDeque::len).sum()
    }

    /// Item counts ordered from `Critical` down to `Deferred`.
    pub fn len_per_priority(&self) -> [usize; BUCKETS] {
        std::array::from_fn(|idx| self.buckets[idx].len())
    }

    /// Enqueues `item` at the back of the bucket matching `priority`.
    pub fn enqueue(&mut self, priority: IntentPriority, item: T) {
        self.buckets[priority.index()].push_back(item);
    }

    /// Pops the next item honoring priority order, FIFO within a bucket.
    pub fn pop_next(&mut self) -> Option<T> {
        self.buckets.iter_mut().find_map(VecDeque::pop_front)
    }

    /// Returns the highest priority bucket that currently has items.
    pub fn current_priority(&self) -> Option<IntentPriority> {
        IntentPriority::DESCENDING
            .into_iter()
            .find(|priority| !self.buckets[priority.index()].is_empty())
    }

    /// Removes every item, highest bucket first.
    pub fn drain_all(&mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len());
        for bucket in self.buckets.iter_mut() {
            out.extend(bucket.drain(..));
        }
        out
    }
}

struct Sequenced {
    seq: u64,
    process: Process,
}

#[derive(Default)]
struct PriorityState {
    queues: PQueues<Sequenced>,
    next_seq: u64,
}

/// Scheduler that always returns the highest-priority ready process.
/// Ties break by submission order.
#[derive(Default)]
pub struct PriorityScheduler {
    state: Mutex<PriorityState>,
    tracker: Mutex<MetricsTracker>,
}

impl PriorityScheduler {
    /// Strategy name.
    pub const NAME: &'static str = "Priority";

    /// Creates an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue depth per priority, ordered from `Critical` down to `Deferred`.
    pub fn len_per_priority(&self) -> [usize; BUCKETS] {
        self.state.lock().queues.len_per_priority()
    }
}

impl Scheduler for PriorityScheduler {
    fn submit(&self, mut process: Process) {
        process.mark_submitted();
        self.tracker.lock().on_submit();
        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        let priority = process.priority();
        state.queues.enqueue(priority, Sequenced { seq, process });
    }

    fn next(&self) -> Option<Process> {
        self.state
            .lock()
            .queues
            .pop_next()
            .map(|entry| entry.process)
    }

    fn complete(&self, mut process: Process) {
        process.mark_finished();
        self.tracker.lock().on_complete(&process);
    }

    fn fail(&self, mut process: Process, reason: &str) {
        trace!("{}: process {} failed: {}", Self::NAME, process.id(), reason);
        process.mark_finished();
        self.tracker.lock().on_fail(&process);
    }

    fn metrics(&self) -> SchedulerMetrics {
        let queued = self.state.lock().queues.len();
        self.tracker.lock().snapshot(queued)
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn queue_len(&self) -> usize {
        self.state.lock().queues.len()
    }

    fn drain(&self) -> Vec<Process> {
        let mut drained = self.state.lock().queues.drain_all();
        drained.sort_by_key(|entry| entry.seq);
        drained.into_iter().map(|entry| entry.process).collect()
    }
}
