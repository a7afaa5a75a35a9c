use log::{trace, warn};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::metrics::{MetricsTracker, SchedulerMetrics};
use crate::process::Process;
use crate::strategy::Scheduler;

/// Ranks ready processes by an opaque predicted value. Higher runs first.
pub trait Scorer: Send + Sync {
    /// Predicted value of running `process` now.
    fn score(&self, process: &Process) -> f64;
}

impl<F> Scorer for F
where
    F: Fn(&Process) -> f64 + Send + Sync,
{
    fn score(&self, process: &Process) -> f64 {
        self(process)
    }
}

/// Default scorer: priority weight plus a bonus that grows with queue wait,
/// so low classes cannot starve indefinitely.
#[derive(Clone, Copy, Debug)]
pub struct AgingScorer {
    /// Score contributed by each priority step.
    pub priority_weight: f64,
    /// Score contributed by each millisecond of wait.
    pub age_weight_per_ms: f64,
}

impl Default for AgingScorer {
    fn default() -> Self {
        Self {
            priority_weight: 100.0,
            age_weight_per_ms: 1.0,
        }
    }
}

impl Scorer for AgingScorer {
    fn score(&self, process: &Process) -> f64 {
        // Bucket index counts down from Critical, so invert it.
        let rank = 4 - process.priority().index();
        let waited_ms = process.waited().as_secs_f64() * 1000.0;
        rank as f64 * self.priority_weight + waited_ms * self.age_weight_per_ms
    }
}

/// Scheduler that delegates ordering to an external [`Scorer`] and only owns
/// queueing and metrics bookkeeping.
pub struct PredictiveScheduler {
    scorer: Arc<dyn Scorer>,
    ready: Mutex<Vec<Process>>,
    tracker: Mutex<MetricsTracker>,
}

impl PredictiveScheduler {
    /// Strategy name.
    pub const NAME: &'static str = "PredictiveBrain";

    /// Creates a scheduler ranked by `scorer`.
    pub fn new(scorer: impl Scorer + 'static) -> Self {
        Self::with_shared_scorer(Arc::new(scorer))
    }

    /// Creates a scheduler around an already shared scorer.
    pub fn with_shared_scorer(scorer: Arc<dyn Scorer>) -> Self {
        Self {
            scorer,
            ready: Mutex::new(Vec::new()),
            tracker: Mutex::new(MetricsTracker::default()),
        }
    }

    // NaN and panicking scorers rank below every finite score.
    fn safe_score(&self, process: &Process) -> f64 {
        match catch_unwind(AssertUnwindSafe(|| self.scorer.score(process))) {
            Ok(score) if !score.is_nan() => score,
            Ok(_) => f64::NEG_INFINITY,
            Err(_) => {
                warn!("{}: scorer panicked for {}", Self::NAME, process.id());
                f64::NEG_INFINITY
            }
        }
    }
}

impl Scheduler for PredictiveScheduler {
    fn submit(&self, mut process: Process) {
        process.mark_submitted();
        self.tracker.lock().on_submit();
        self.ready.lock().push(process);
    }

    fn next(&self) -> Option<Process> {
        let mut ready = self.ready.lock();
        let mut best: Option<(usize, f64)> = None;
        for (idx, process) in ready.iter().enumerate() {
            let score = self.safe_score(process);
            // Strict comparison keeps the earliest submission on ties.
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((idx, score)),
            }
        }
        let (idx, score) = best?;
        let process = ready.remove(idx);
        trace!("{}: picked {} score={:.3}", Self::NAME, process.id(), score);
        Some(process)
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
        let queued = self.ready.lock().len();
        self.tracker.lock().snapshot(queued)
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn queue_len(&self) -> usize {
        self.ready.lock().len()
    }

    fn drain(&self) -> Vec<Process> {
        std::mem::take(&mut *self.ready.lock())
    }
}
