use log::trace;
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::metrics::{MetricsTracker, SchedulerMetrics};
use crate::process::Process;
use crate::strategy::Scheduler;

/// Submission-order scheduler with no priority distinction.
#[derive(Default)]
pub struct RoundRobinScheduler {
    queue: Mutex<VecDeque<Process>>,
    tracker: Mutex<MetricsTracker>,
}

impl RoundRobinScheduler {
    /// Strategy name.
    pub const NAME: &'static str = "RoundRobin";

    /// Creates an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for RoundRobinScheduler {
    fn submit(&self, mut process: Process) {
        process.mark_submitted();
        self.tracker.lock().on_submit();
        self.queue.lock().push_back(process);
    }

    fn next(&self) -> Option<Process> {
        self.queue.lock().pop_front()
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
        let queued = self.queue.lock().len();
        self.tracker.lock().snapshot(queued)
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    fn drain(&self) -> Vec<Process> {
        self.queue.lock().drain(..).collect()
    }
}
