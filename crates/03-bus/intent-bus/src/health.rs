//! Coarse health derived from lifecycle and queue pressure.

use serde::Serialize;

/// Overall health classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    /// Running with headroom.
    Healthy,
    /// Running but close to a resource limit.
    Degraded,
    /// Not running.
    Unhealthy,
}

/// Snapshot polled by dashboards and the CLI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// Classification.
    pub status: HealthStatus,
    /// Human-readable explanation.
    pub message: String,
    /// Milliseconds since the last start; zero when stopped.
    pub uptime_ms: u64,
    /// Items waiting in the bounded queue.
    pub queue_size: usize,
    /// Bounded queue capacity.
    pub queue_capacity: usize,
}

impl HealthReport {
    /// Classifies a bus: unhealthy when stopped, degraded above 90% occupancy.
    pub fn assess(running: bool, uptime_ms: u64, queue_size: usize, queue_capacity: usize) -> Self {
        let (status, message) = if !running {
            (HealthStatus::Unhealthy, "not running")
        } else if queue_capacity > 0 && queue_size * 10 > queue_capacity * 9 {
            (HealthStatus::Degraded, "queue near capacity")
        } else {
            (HealthStatus::Healthy, "ok")
        };
        Self {
            status,
            message: message.to_string(),
            uptime_ms: if running { uptime_ms } else { 0 },
            queue_size,
            queue_capacity,
        }
    }

    /// Convenience for `status == Healthy`.
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_is_unhealthy() {
        let report = HealthReport::assess(false, 1234, 0, 100);
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert_eq!(report.uptime_ms, 0);
    }

    #[test]
    fn degraded_only_strictly_above_ninety_percent() {
        assert_eq!(HealthReport::assess(true, 1, 90, 100).status, HealthStatus::Healthy);
        assert_eq!(HealthReport::assess(true, 1, 91, 100).status, HealthStatus::Degraded);
        assert_eq!(HealthReport::assess(true, 1, 10, 10).status, HealthStatus::Degraded);
        assert!(HealthReport::assess(true, 1, 9, 10).is_healthy());
    }
}
