//! Fixed-size worker pool fed by a bounded job channel.

use crossbeam_channel::{bounded, SendTimeoutError, Sender};
use log::trace;
use std::time::{Duration, Instant};

use crate::error::BusResult;
use crate::threads::ThreadGroup;

/// Unit of work executed by a pool thread.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Cloneable submission side of a [`WorkerPool`].
#[derive(Clone)]
pub struct PoolHandle {
    jobs: Sender<Job>,
}

impl PoolHandle {
    /// Queues `job`, waiting while the backlog is full.
    ///
    /// Returns `false` once the pool has shut down.
    pub fn execute<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.jobs.send(Box::new(job)).is_ok()
    }

    /// Queues `job`, waiting at most `timeout` for backlog space.
    ///
    /// The job is handed back on timeout or when the pool has shut down.
    pub fn execute_within(&self, job: Job, timeout: Duration) -> Result<(), SendTimeoutError<Job>> {
        self.jobs.send_timeout(job, timeout)
    }
}

/// Fixed set of threads draining a shared job channel.
///
/// At most `backlog` jobs wait for a worker; submitters see the pool as full
/// beyond that. Jobs already queued when shutdown begins still run; the
/// channel closes once every [`PoolHandle`] is dropped.
pub struct WorkerPool {
    handle: PoolHandle,
    workers: ThreadGroup,
}

impl WorkerPool {
    /// Starts `size` workers named `{label}-worker-{n}`.
    pub fn spawn(label: &str, size: usize, backlog: usize) -> BusResult<Self> {
        let (tx, rx) = bounded::<Job>(backlog);
        let mut workers = ThreadGroup::new(format!("{label} workers"));
        for idx in 0..size {
            let rx = rx.clone();
            let name = format!("{label}-worker-{idx}");
            workers.spawn(name, move || {
                for job in rx.iter() {
                    job();
                }
                trace!("worker {idx} drained");
            })?;
        }
        Ok(Self {
            handle: PoolHandle { jobs: tx },
            workers,
        })
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// A submission handle that outlives borrows of the pool.
    pub fn handle(&self) -> PoolHandle {
        self.handle.clone()
    }

    /// Queues `job`; see [`PoolHandle::execute`].
    pub fn execute<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.handle.execute(job)
    }

    /// Closes the pool's own sender and joins workers until `deadline`.
    ///
    /// Workers exit after outstanding handles are dropped and the channel
    /// is empty.
    pub fn shutdown(self, deadline: Instant) -> bool {
        drop(self.handle);
        self.workers.join_until(deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn queued_jobs_finish_before_shutdown_returns() {
        let pool = WorkerPool::spawn("test", 2, 16).unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..16 {
            let done = Arc::clone(&done);
            assert!(pool.execute(move || {
                done.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(pool.size(), 2);
        assert!(pool.shutdown(Instant::now() + Duration::from_secs(2)));
        assert_eq!(done.load(Ordering::SeqCst), 16);
    }

    #[test]
    fn outstanding_handles_keep_workers_alive() {
        let pool = WorkerPool::spawn("held", 1, 1).unwrap();
        let handle = pool.handle();
        assert!(!pool.shutdown(Instant::now() + Duration::from_millis(50)));
        assert!(handle.execute(|| {}));
        drop(handle);
    }

    #[test]
    fn full_backlog_hands_the_job_back() {
        let pool = WorkerPool::spawn("full", 1, 1).unwrap();
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        let (entered_tx, entered_rx) = crossbeam_channel::bounded::<()>(1);
        assert!(pool.execute(move || {
            entered_tx.send(()).unwrap();
            release_rx.recv().unwrap();
        }));
        entered_rx.recv().unwrap();
        assert!(pool.execute(|| {}));

        let handle = pool.handle();
        let rejected = handle.execute_within(Box::new(|| {}), Duration::from_millis(20));
        assert!(matches!(rejected, Err(SendTimeoutError::Timeout(_))));

        release_tx.send(()).unwrap();
        drop(handle);
        assert!(pool.shutdown(Instant::now() + Duration::from_secs(2)));
    }
}
