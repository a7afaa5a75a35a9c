//! Bus counters and the metrics snapshot built from them.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Throughput snapshot of a bus.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BusMetrics {
    /// Intents admitted for queueing, including ones later dropped.
    pub published: u64,
    /// Intents that completed successfully.
    pub processed: u64,
    /// Intents that failed at admission, during dispatch, or on shutdown.
    pub failed: u64,
    /// Admission failures caused by a full queue.
    pub dropped: u64,
    /// Mean dispatch latency over dispatched intents.
    pub avg_latency_ms: f64,
    /// Items waiting in the bounded queue.
    pub queue_size: usize,
    /// Bounded queue capacity.
    pub queue_capacity: usize,
    /// Entries retained in history.
    pub history_size: usize,
    /// Requests awaiting a result.
    pub pending_requests: usize,
    /// Milliseconds since the last start; zero when stopped.
    pub uptime_ms: u64,
}

/// Monotonic counters updated from producer and worker threads.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    published: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    dispatched: AtomicU64,
    latency_ms: AtomicU64,
}

impl Counters {
    pub(crate) fn on_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_abandoned(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_dispatched(&self, success: bool, latency: Duration) {
        if success {
            self.processed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        self.latency_ms
            .fetch_add(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Fills the counter fields of `metrics`.
    pub(crate) fn fill(&self, metrics: &mut BusMetrics) {
        metrics.published = self.published.load(Ordering::Relaxed);
        metrics.processed = self.processed.load(Ordering::Relaxed);
        metrics.failed = self.failed.load(Ordering::Relaxed);
        metrics.dropped = self.dropped.load(Ordering::Relaxed);
        let dispatched = self.dispatched.load(Ordering::Relaxed);
        metrics.avg_latency_ms = if dispatched == 0 {
            0.0
        } else {
            self.latency_ms.load(Ordering::Relaxed) as f64 / dispatched as f64
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_count_as_failures() {
        let counters = Counters::default();
        counters.on_published();
        counters.on_published();
        counters.on_dropped();
        counters.on_dispatched(true, Duration::from_millis(4));

        let mut metrics = BusMetrics::default();
        counters.fill(&mut metrics);
        assert_eq!(metrics.published, 2);
        assert_eq!(metrics.processed, 1);
        assert_eq!(metrics.failed, 1);
        assert_eq!(metrics.dropped, 1);
        assert_eq!(metrics.avg_latency_ms, 4.0);
    }
}
