use serde::Deserialize;
use std::time::Duration;

use crate::error::{KernelError, KernelResult};

/// Tunables for a [`crate::Kernel`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Size of the process worker pool.
    pub worker_threads: usize,
    /// Upper bound on processes handed to workers but not yet finished.
    /// Defaults to twice `worker_threads` when unset.
    pub max_in_flight: Option<usize>,
    /// Sleep between polls when the scheduler is empty or the kernel is saturated.
    pub idle_backoff_ms: u64,
    /// How long `stop` waits for threads before detaching them.
    pub shutdown_grace_ms: u64,
    /// Finished process records kept for status queries. Unset keeps every
    /// record until [`crate::Kernel::prune_finished`] runs.
    pub finished_retention: Option<usize>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            max_in_flight: None,
            idle_backoff_ms: 10,
            shutdown_grace_ms: 5_000,
            finished_retention: None,
        }
    }
}

impl KernelConfig {
    /// Sets the worker pool size.
    pub fn with_worker_threads(mut self, workers: usize) -> Self {
        self.worker_threads = workers;
        self
    }

    /// Pins the in-flight limit instead of deriving it from the pool size.
    pub fn with_max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = Some(limit);
        self
    }

    /// Sets the idle backoff.
    pub fn with_idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff_ms = backoff.as_millis() as u64;
        self
    }

    /// Sets the shutdown grace period.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace_ms = grace.as_millis() as u64;
        self
    }

    /// Keeps at most `records` finished processes in the process table.
    pub fn with_finished_retention(mut self, records: usize) -> Self {
        self.finished_retention = Some(records);
        self
    }

    /// Effective in-flight limit.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
            .unwrap_or_else(|| self.worker_threads.saturating_mul(2))
    }

    /// Idle backoff as a [`Duration`].
    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    /// Shutdown grace period as a [`Duration`].
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Rejects values the kernel cannot run with.
    pub fn validate(&self) -> KernelResult<()> {
        if self.worker_threads == 0 {
            return Err(KernelError::InvalidConfig("worker_threads must be non-zero"));
        }
        if self.max_in_flight() == 0 {
            return Err(KernelError::InvalidConfig("max_in_flight must be non-zero"));
        }
        if self.finished_retention == Some(0) {
            return Err(KernelError::InvalidConfig("finished_retention must be non-zero"));
        }
        if self.idle_backoff_ms == 0 {
            return Err(KernelError::InvalidConfig("idle_backoff_ms must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_flight_limit_tracks_worker_count() {
        let config = KernelConfig::default();
        assert_eq!(config.max_in_flight(), 8);
        assert_eq!(config.with_worker_threads(3).max_in_flight(), 6);
        let pinned = KernelConfig::default().with_max_in_flight(1).with_worker_threads(16);
        assert_eq!(pinned.max_in_flight(), 1);
    }

    #[test]
    fn zero_values_are_rejected() {
        let err = KernelConfig::default().with_worker_threads(0).validate();
        assert!(matches!(err, Err(KernelError::InvalidConfig(_))));
        let err = KernelConfig::default().with_max_in_flight(0).validate();
        assert!(matches!(err, Err(KernelError::InvalidConfig(_))));
        let err = KernelConfig::default().with_finished_retention(0).validate();
        assert!(matches!(err, Err(KernelError::InvalidConfig(_))));
        assert!(KernelConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_documents_fill_in_defaults() {
        let config: KernelConfig = serde_json::from_str(r#"{"worker_threads": 2}"#).unwrap();
        assert_eq!(config.max_in_flight(), 4);
        assert_eq!(config.idle_backoff(), Duration::from_millis(10));
        assert_eq!(config.finished_retention, None);
    }
}
