use serde::Deserialize;
use std::time::Duration;

use crate::error::{BusError, BusResult};

/// Tunables for an [`crate::IntentBus`].
///
/// Every field has a default, so partial documents deserialize cleanly.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Maximum number of intents waiting for a worker.
    pub queue_capacity: usize,
    /// Number of terminal intents retained in history.
    pub history_limit: usize,
    /// Size of the dispatch worker pool.
    pub worker_threads: usize,
    /// Timeout applied by `request_default`.
    pub request_timeout_ms: u64,
    /// How long the pump waits on an empty queue before re-checking shutdown.
    pub poll_interval_ms: u64,
    /// How long `stop` waits for threads before detaching them.
    pub shutdown_grace_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            history_limit: 1000,
            worker_threads: 4,
            request_timeout_ms: 30_000,
            poll_interval_ms: 100,
            shutdown_grace_ms: 5_000,
        }
    }
}

impl BusConfig {
    /// Sets the bounded queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the history ring size.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Sets the worker pool size.
    pub fn with_worker_threads(mut self, workers: usize) -> Self {
        self.worker_threads = workers;
        self
    }

    /// Sets the default request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Sets the pump poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Sets the shutdown grace period.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace_ms = grace.as_millis() as u64;
        self
    }

    /// Default request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Pump poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Shutdown grace period as a [`Duration`].
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Rejects values the bus cannot run with.
    pub fn validate(&self) -> BusResult<()> {
        if self.queue_capacity == 0 {
            return Err(BusError::InvalidConfig("queue_capacity must be non-zero"));
        }
        if self.history_limit == 0 {
            return Err(BusError::InvalidConfig("history_limit must be non-zero"));
        }
        if self.worker_threads == 0 {
            return Err(BusError::InvalidConfig("worker_threads must be non-zero"));
        }
        if self.poll_interval_ms == 0 {
            return Err(BusError::InvalidConfig("poll_interval_ms must be non-zero"));
        }
        Ok(())
    }
}
