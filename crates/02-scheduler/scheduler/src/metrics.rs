//! Comparative scheduler metrics.

use serde::Serialize;
use std::time::Duration;

use crate::process::Process;

/// Snapshot of a scheduler's counters and averages.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SchedulerMetrics {
    /// Processes accepted by `submit`.
    pub submitted: u64,
    /// Processes reported through `complete`.
    pub completed: u64,
    /// Processes reported through `fail`.
    pub failed: u64,
    /// Mean queue wait over finished processes.
    pub avg_wait_ms: f64,
    /// Mean execution time over finished processes.
    pub avg_execution_ms: f64,
    /// Processes currently waiting in the ready queue.
    pub current_queue_size: usize,
}

/// Incremental accumulator shared by every strategy.
#[derive(Debug, Default)]
pub(crate) struct MetricsTracker {
    submitted: u64,
    completed: u64,
    failed: u64,
    total_wait: Duration,
    total_execution: Duration,
}

impl MetricsTracker {
    pub(crate) fn on_submit(&mut self) {
        self.submitted += 1;
    }

    pub(crate) fn on_complete(&mut self, process: &Process) {
        self.completed += 1;
        self.accumulate(process);
    }

    // Failed runs still consumed wall-clock time and count toward averages.
    pub(crate) fn on_fail(&mut self, process: &Process) {
        self.failed += 1;
        self.accumulate(process);
    }

    fn accumulate(&mut self, process: &Process) {
        self.total_wait += process.waited();
        self.total_execution += process.executed();
    }

    pub(crate) fn snapshot(&self, current_queue_size: usize) -> SchedulerMetrics {
        let finished = self.completed + self.failed;
        let avg = |total: Duration| {
            if finished == 0 {
                0.0
            } else {
                total.as_secs_f64() * 1000.0 / finished as f64
            }
        };
        SchedulerMetrics {
            submitted: self.submitted,
            completed: self.completed,
            failed: self.failed,
            avg_wait_ms: avg(self.total_wait),
            avg_execution_ms: avg(self.total_execution),
            current_queue_size,
        }
    }
}
