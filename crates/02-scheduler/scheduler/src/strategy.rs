use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::SchedulerError;
use crate::metrics::SchedulerMetrics;
use crate::predictive::{AgingScorer, PredictiveScheduler};
use crate::priority::PriorityScheduler;
use crate::process::Process;
use crate::round_robin::RoundRobinScheduler;

/// Contract shared by every scheduling strategy.
///
/// Implementations are internally synchronised: producers, the dispatch loop,
/// and workers reporting outcomes may call in from different threads.
pub trait Scheduler: Send + Sync {
    /// Takes ownership of `process` and queues it.
    fn submit(&self, process: Process);

    /// Removes and returns the next process to run, if any is ready.
    fn next(&self) -> Option<Process>;

    /// Records a successful execution.
    fn complete(&self, process: Process);

    /// Records a failed execution. Wait and execution time still count.
    fn fail(&self, process: Process, reason: &str);

    /// Current counters and averages.
    fn metrics(&self) -> SchedulerMetrics;

    /// Strategy identifier for diagnostics and runtime switching.
    fn name(&self) -> &'static str;

    /// Number of processes waiting to run.
    fn queue_len(&self) -> usize;

    /// Empties the ready queue, returning processes in submission order.
    fn drain(&self) -> Vec<Process>;
}

/// Named strategies that can be selected at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyKind {
    /// Submission order.
    RoundRobin,
    /// Highest priority first.
    Priority,
    /// Highest predicted score first.
    Predictive,
}

impl StrategyKind {
    /// Every strategy, in benchmark order.
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::RoundRobin,
        StrategyKind::Priority,
        StrategyKind::Predictive,
    ];

    /// Builds a fresh scheduler. The predictive strategy gets an [`AgingScorer`].
    pub fn instantiate(self) -> Arc<dyn Scheduler> {
        match self {
            StrategyKind::RoundRobin => Arc::new(RoundRobinScheduler::new()),
            StrategyKind::Priority => Arc::new(PriorityScheduler::new()),
            StrategyKind::Predictive => Arc::new(PredictiveScheduler::new(AgingScorer::default())),
        }
    }

    /// Name reported by schedulers of this kind.
    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::RoundRobin => RoundRobinScheduler::NAME,
            StrategyKind::Priority => PriorityScheduler::NAME,
            StrategyKind::Predictive => PredictiveScheduler::NAME,
        }
    }
}

impl FromStr for StrategyKind {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "roundrobin" | "round-robin" | "round_robin" | "fifo" => Ok(StrategyKind::RoundRobin),
            "priority" => Ok(StrategyKind::Priority),
            "predictive" | "brain" => Ok(StrategyKind::Predictive),
            _ => Err(SchedulerError::UnknownStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases_case_insensitively() {
        assert_eq!("FIFO".parse(), Ok(StrategyKind::RoundRobin));
        assert_eq!("Round-Robin".parse(), Ok(StrategyKind::RoundRobin));
        assert_eq!(" priority ".parse(), Ok(StrategyKind::Priority));
        assert_eq!("brain".parse(), Ok(StrategyKind::Predictive));
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert_eq!(
            "lottery".parse::<StrategyKind>(),
            Err(SchedulerError::UnknownStrategy("lottery".into()))
        );
    }

    #[test]
    fn instantiated_schedulers_report_their_kind() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.instantiate().name(), kind.name());
        }
    }
}
