use intent_bus::HealthStatus;
use scheduler::SchedulerMetrics;
use serde::Serialize;

/// Queue depth, in multiples of the in-flight limit, above which the kernel
/// reports itself degraded.
pub const DEGRADED_BACKLOG_FACTOR: usize = 10;

/// Health snapshot of a kernel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KernelHealth {
    /// Classification.
    pub status: HealthStatus,
    /// Human-readable explanation.
    pub message: String,
    /// Milliseconds since the last start; zero when stopped.
    pub uptime_ms: u64,
    /// Active scheduling strategy.
    pub scheduler: String,
    /// Processes waiting in the scheduler.
    pub queue_size: usize,
    /// Processes handed to workers and not yet finished.
    pub in_flight: usize,
}

impl KernelHealth {
    /// Unhealthy when stopped, degraded when the backlog outgrows the
    /// in-flight limit by [`DEGRADED_BACKLOG_FACTOR`].
    pub fn assess(
        running: bool,
        uptime_ms: u64,
        scheduler: &str,
        queue_size: usize,
        in_flight: usize,
        max_in_flight: usize,
    ) -> Self {
        let (status, message) = if !running {
            (HealthStatus::Unhealthy, "not running")
        } else if queue_size > max_in_flight.saturating_mul(DEGRADED_BACKLOG_FACTOR) {
            (HealthStatus::Degraded, "scheduler backlog")
        } else {
            (HealthStatus::Healthy, "ok")
        };
        Self {
            status,
            message: message.to_string(),
            uptime_ms: if running { uptime_ms } else { 0 },
            scheduler: scheduler.to_string(),
            queue_size,
            in_flight,
        }
    }
}

/// Scheduler counters plus kernel-level gauges.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct KernelMetrics {
    /// Active scheduling strategy.
    pub scheduler: String,
    /// Counters of the active strategy.
    pub scheduler_metrics: SchedulerMetrics,
    /// Processes in the tracking table.
    pub tracked_processes: usize,
    /// Processes handed to workers and not yet finished.
    pub in_flight: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backlog_beyond_ten_times_in_flight_degrades() {
        let at_limit = KernelHealth::assess(true, 5, "Priority", 80, 8, 8);
        assert_eq!(at_limit.status, HealthStatus::Healthy);
        let over = KernelHealth::assess(true, 5, "Priority", 81, 8, 8);
        assert_eq!(over.status, HealthStatus::Degraded);
        assert_eq!(over.scheduler, "Priority");
    }

    #[test]
    fn stopped_kernel_is_unhealthy_with_zero_uptime() {
        let report = KernelHealth::assess(false, 1_000, "RoundRobin", 0, 0, 8);
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert_eq!(report.uptime_ms, 0);
    }
}
