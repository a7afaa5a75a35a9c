use log::info;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::metrics::SchedulerMetrics;
use crate::process::Process;
use crate::strategy::Scheduler;

/// Holder for the active scheduler that supports live replacement.
///
/// Submissions and dequeues go through the slot so a replacement can move
/// the ready queue atomically: nothing is submitted to the outgoing strategy
/// after it has been drained.
pub struct SchedulerSlot {
    current: RwLock<Arc<dyn Scheduler>>,
}

impl SchedulerSlot {
    /// Wraps the initial strategy.
    pub fn new(initial: Arc<dyn Scheduler>) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }

    /// The strategy currently in charge.
    pub fn current(&self) -> Arc<dyn Scheduler> {
        Arc::clone(&self.current.read())
    }

    /// Name of the active strategy.
    pub fn name(&self) -> &'static str {
        self.current.read().name()
    }

    /// Submits to the active strategy.
    pub fn submit(&self, process: Process) {
        self.current.read().submit(process);
    }

    /// Dequeues from the active strategy, returning it alongside the process.
    ///
    /// Outcomes must be reported to the returned owner so each strategy's
    /// metrics stay self-consistent across a swap.
    pub fn next(&self) -> Option<(Arc<dyn Scheduler>, Process)> {
        let current = self.current.read();
        current.next().map(|process| (Arc::clone(&current), process))
    }

    /// Metrics of the active strategy.
    pub fn metrics(&self) -> SchedulerMetrics {
        self.current.read().metrics()
    }

    /// Queue depth of the active strategy.
    pub fn queue_len(&self) -> usize {
        self.current.read().queue_len()
    }

    /// Installs `next`, moving every queued process into it in submission
    /// order. Returns the previous strategy.
    pub fn replace(&self, next: Arc<dyn Scheduler>) -> Arc<dyn Scheduler> {
        let mut current = self.current.write();
        let moved = current.drain();
        let count = moved.len();
        for process in moved {
            next.submit(process);
        }
        info!(
            "scheduler replaced: {} -> {} (moved {} queued processes)",
            current.name(),
            next.name(),
            count
        );
        std::mem::replace(&mut *current, next)
    }
}
