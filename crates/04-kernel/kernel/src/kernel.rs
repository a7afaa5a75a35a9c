//! Process loop driving a swappable scheduler on a dedicated worker pool.

use intent::Intent;
use intent_bus::{PoolHandle, ThreadGroup, WorkerPool};
use log::{debug, info, trace, warn};
use parking_lot::Mutex;
use scheduler::{Process, ProcessId, Scheduler, SchedulerSlot};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::KernelConfig;
use crate::error::KernelResult;
use crate::health::{KernelHealth, KernelMetrics};
use crate::table::{ProcessRecord, ProcessStatus, ProcessTable};
use crate::tasks::{Task, TaskRegistry};

const NAME: &str = "kernel";

/// State shared by the kernel handle, its threads, and the bus handlers.
pub(crate) struct Core {
    config: KernelConfig,
    running: AtomicBool,
    started_at: Mutex<Option<Instant>>,
    slot: SchedulerSlot,
    pub(crate) table: ProcessTable,
    pub(crate) tasks: TaskRegistry,
    in_flight: AtomicUsize,
}

struct Runtime {
    process_loop: ThreadGroup,
    pool: WorkerPool,
}

impl Core {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn spawn(&self, process: Process) -> ProcessId {
        let id = process.id().clone();
        self.table.track(&process);
        debug!(
            "process_spawned id={} intent_type={} priority={}",
            id,
            process.intent().intent_type(),
            process.priority()
        );
        self.slot.submit(process);
        id
    }

    fn execute(&self, owner: Arc<dyn Scheduler>, mut process: Process) {
        let outcome = process.run();
        let id = process.id().clone();
        match outcome {
            Ok(()) => {
                self.table.set_status(&id, ProcessStatus::Completed, None);
                trace!("process {id} completed in {:?}", process.executed());
                owner.complete(process);
            }
            Err(err) => {
                let reason = format!("{err:#}");
                warn!("process {id} failed: {reason}");
                self.table
                    .set_status(&id, ProcessStatus::Failed, Some(reason.clone()));
                owner.fail(process, &reason);
            }
        }
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    fn uptime_ms(&self) -> u64 {
        self.started_at
            .lock()
            .map(|started| started.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }

    pub(crate) fn health(&self) -> KernelHealth {
        KernelHealth::assess(
            self.is_running(),
            self.uptime_ms(),
            self.slot.name(),
            self.slot.queue_len(),
            self.in_flight.load(Ordering::Acquire),
            self.config.max_in_flight(),
        )
    }

    fn metrics(&self) -> KernelMetrics {
        KernelMetrics {
            scheduler: self.slot.name().to_string(),
            scheduler_metrics: self.slot.metrics(),
            tracked_processes: self.table.len(),
            in_flight: self.in_flight.load(Ordering::Acquire),
        }
    }
}

fn process_loop(core: Arc<Core>, pool: PoolHandle) {
    let backoff = core.config.idle_backoff();
    let limit = core.config.max_in_flight();
    while core.is_running() {
        if core.in_flight.load(Ordering::Acquire) >= limit {
            thread::sleep(backoff);
            continue;
        }
        // Count the slot before dequeueing so `wait_idle` never sees a gap.
        core.in_flight.fetch_add(1, Ordering::AcqRel);
        let Some((owner, process)) = core.slot.next() else {
            core.in_flight.fetch_sub(1, Ordering::AcqRel);
            thread::sleep(backoff);
            continue;
        };
        core.table
            .set_status(process.id(), ProcessStatus::Running, None);

        let id = process.id().clone();
        let worker = Arc::clone(&core);
        if !pool.execute(move || worker.execute(owner, process)) {
            warn!("worker pool closed; process {id} dropped");
            core.table.set_status(
                &id,
                ProcessStatus::Failed,
                Some("worker pool closed".to_string()),
            );
            core.in_flight.fetch_sub(1, Ordering::AcqRel);
        }
    }
    trace!("process loop exited");
}

/// Execution substrate for [`Process`]es.
///
/// Spawned processes wait in the active [`Scheduler`]; a loop thread pulls
/// them in scheduler order while fewer than `max_in_flight` are running and
/// hands them to a fixed worker pool. The strategy can be replaced at any
/// time without losing queued processes.
pub struct Kernel {
    core: Arc<Core>,
    runtime: Mutex<Option<Runtime>>,
}

impl Kernel {
    /// Builds a stopped kernel around `scheduler`.
    pub fn new(config: KernelConfig, scheduler: Arc<dyn Scheduler>) -> KernelResult<Self> {
        config.validate()?;
        let table = ProcessTable::with_retention(config.finished_retention);
        let core = Core {
            config,
            running: AtomicBool::new(false),
            started_at: Mutex::new(None),
            slot: SchedulerSlot::new(scheduler),
            table,
            tasks: TaskRegistry::new(),
            in_flight: AtomicUsize::new(0),
        };
        Ok(Self {
            core: Arc::new(core),
            runtime: Mutex::new(None),
        })
    }

    pub(crate) fn core(&self) -> &Arc<Core> {
        &self.core
    }

    /// Active configuration.
    pub fn config(&self) -> &KernelConfig {
        &self.core.config
    }

    /// Whether the process loop is running.
    pub fn is_running(&self) -> bool {
        self.core.is_running()
    }

    /// Spawns the worker pool and the process loop. No-op if already running.
    pub fn start(&self) -> KernelResult<()> {
        let mut runtime = self.runtime.lock();
        if runtime.is_some() {
            return Ok(());
        }
        let core = &self.core;
        let workers = core.config.worker_threads;
        let pool = WorkerPool::spawn(NAME, workers, core.config.max_in_flight())?;

        core.running.store(true, Ordering::Release);
        *core.started_at.lock() = Some(Instant::now());

        let mut process_loop_thread = ThreadGroup::new("kernel process loop");
        let loop_core = Arc::clone(core);
        let handle = pool.handle();
        if let Err(err) = process_loop_thread.spawn("kernel-loop", move || {
            process_loop(loop_core, handle)
        }) {
            core.running.store(false, Ordering::Release);
            *core.started_at.lock() = None;
            pool.shutdown(Instant::now() + core.config.shutdown_grace());
            return Err(err.into());
        }

        *runtime = Some(Runtime {
            process_loop: process_loop_thread,
            pool,
        });
        info!(
            "kernel started (scheduler={}, workers={}, max_in_flight={})",
            core.slot.name(),
            workers,
            core.config.max_in_flight()
        );
        Ok(())
    }

    /// Stops pulling new processes and shuts the threads down.
    ///
    /// Processes already handed to workers finish. Processes still waiting in
    /// the scheduler stay queued and run after the next `start`.
    pub fn stop(&self) {
        let mut runtime = self.runtime.lock();
        let Some(Runtime {
            process_loop,
            pool,
        }) = runtime.take()
        else {
            return;
        };
        let core = &self.core;
        let uptime_ms = core.uptime_ms();
        core.running.store(false, Ordering::Release);

        let deadline = Instant::now() + core.config.shutdown_grace();
        let loop_joined = process_loop.join_until(deadline);
        let workers_joined = pool.shutdown(deadline);
        *core.started_at.lock() = None;

        if !(loop_joined && workers_joined) {
            warn!("kernel stopped with threads still running");
        }
        info!(
            "kernel stopped (uptime_ms={uptime_ms}, queued={})",
            core.slot.queue_len()
        );
    }

    /// `stop` followed by `start`.
    pub fn restart(&self) -> KernelResult<()> {
        self.stop();
        self.start()
    }

    /// Queues `action` as a new process for `intent` and returns its id.
    ///
    /// Processes may be spawned while the kernel is stopped; they run once it
    /// starts. Finished records stay in the process table until
    /// [`Kernel::prune_finished`] runs, or until they fall outside
    /// [`KernelConfig::finished_retention`] when that is set.
    pub fn spawn<F>(&self, intent: impl Into<Arc<Intent>>, action: F) -> ProcessId
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.core.spawn(Process::new(intent.into(), action))
    }

    /// Registers a named task for `PROCESS_SPAWN` intents.
    pub fn register_task<F>(&self, name: impl Into<String>, task: F)
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let task: Task = Arc::new(task);
        self.core.tasks.register(name, task);
    }

    /// Replaces the scheduling strategy, moving queued processes across.
    /// Returns the previous strategy.
    pub fn set_scheduler(&self, next: Arc<dyn Scheduler>) -> Arc<dyn Scheduler> {
        self.core.slot.replace(next)
    }

    /// Name of the active strategy.
    pub fn scheduler_name(&self) -> &'static str {
        self.core.slot.name()
    }

    /// Status of process `id`, if tracked.
    pub fn status(&self, id: &ProcessId) -> Option<ProcessStatus> {
        self.core.table.status(id)
    }

    /// Full record of process `id`, if tracked.
    pub fn process(&self, id: &ProcessId) -> Option<ProcessRecord> {
        self.core.table.get(id)
    }

    /// Forgets finished processes; returns how many were removed.
    pub fn prune_finished(&self) -> usize {
        self.core.table.prune_finished()
    }

    /// Blocks until no process is queued or running, or `timeout` passes.
    ///
    /// Returns `true` when the kernel went idle in time.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let backoff = self.core.config.idle_backoff();
        loop {
            let idle = self.core.slot.queue_len() == 0
                && self.core.in_flight.load(Ordering::Acquire) == 0;
            if idle {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(backoff);
        }
    }

    /// Current health classification.
    pub fn health(&self) -> KernelHealth {
        self.core.health()
    }

    /// Scheduler counters plus kernel gauges.
    pub fn metrics(&self) -> KernelMetrics {
        self.core.metrics()
    }
}

impl Drop for Kernel {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intent::IntentType;
    use scheduler::StrategyKind;

    fn kernel(config: KernelConfig) -> Kernel {
        let _ = env_logger::builder().is_test(true).try_init();
        Kernel::new(config, StrategyKind::Priority.instantiate()).unwrap()
    }

    #[test]
    fn spawned_processes_wait_until_start() {
        let kernel = kernel(KernelConfig::default().with_worker_threads(1));
        let id = kernel.spawn(Intent::new(IntentType::ProcessSpawn), || Ok(()));
        assert_eq!(kernel.status(&id), Some(ProcessStatus::Pending));
        assert_eq!(kernel.metrics().scheduler_metrics.current_queue_size, 1);

        kernel.start().unwrap();
        assert!(kernel.wait_idle(Duration::from_secs(5)));
        assert_eq!(kernel.status(&id), Some(ProcessStatus::Completed));
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let kernel = kernel(KernelConfig::default().with_worker_threads(2));
        kernel.start().unwrap();
        kernel.start().unwrap();
        assert!(kernel.is_running());
        kernel.stop();
        kernel.stop();
        assert!(!kernel.is_running());
        kernel.restart().unwrap();
        assert!(kernel.health().status == intent_bus::HealthStatus::Healthy);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let result = Kernel::new(
            KernelConfig::default().with_worker_threads(0),
            StrategyKind::RoundRobin.instantiate(),
        );
        assert!(result.is_err());
    }
}
