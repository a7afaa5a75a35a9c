//! The intent bus: bounded admission, pump, worker dispatch, and requests.

use crossbeam_channel::SendTimeoutError;
use intent::{Intent, IntentResult, IntentState, IntentType};
use log::{debug, info, trace, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use crate::config::BusConfig;
use crate::error::BusResult;
use crate::events::{BusEvent, EventSink, LogEventSink, REASON_QUEUE_FULL};
use crate::guard::{guarded, FirstFailure};
use crate::handler::{Handler, HandlerRegistry};
use crate::health::HealthReport;
use crate::history::History;
use crate::metrics::{BusMetrics, Counters};
use crate::outcome::{ShutdownReport, SubmitOutcome};
use crate::pool::{Job, PoolHandle, WorkerPool};
use crate::queue::BoundedQueue;
use crate::response::{IntentResponse, PendingRequests};
use crate::subscription::{Subscription, SubscriptionRegistry};
use crate::threads::ThreadGroup;
use crate::timer::Timer;

/// Error recorded when admission finds the queue full.
pub const QUEUE_FULL: &str = "queue full";
/// Error returned to requests made while the bus is stopped.
pub const NOT_RUNNING: &str = "bus not running";
/// Error recorded for work abandoned by `stop`.
pub const BUS_STOPPED: &str = "bus stopped";
/// Error returned when an intent is submitted twice.
pub const ALREADY_PUBLISHED: &str = "intent already published";

const DEFAULT_NAME: &str = "IntentBus";

/// Builder for [`IntentBus`].
pub struct IntentBusBuilder {
    name: String,
    config: BusConfig,
    sink: Arc<dyn EventSink>,
}

impl Default for IntentBusBuilder {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            config: BusConfig::default(),
            sink: Arc::new(LogEventSink),
        }
    }
}

impl IntentBusBuilder {
    /// Starts from the default configuration and a [`LogEventSink`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Name used for threads and log lines.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replaces the configuration.
    pub fn config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    /// Routes observability events to `sink`.
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Validates the configuration and builds a stopped bus.
    pub fn build(self) -> BusResult<IntentBus> {
        self.config.validate()?;
        let shared = Shared {
            queue: BoundedQueue::new(self.config.queue_capacity),
            history: History::new(self.config.history_limit),
            name: self.name,
            config: self.config,
            running: AtomicBool::new(false),
            started_at: Mutex::new(None),
            subscriptions: SubscriptionRegistry::new(),
            handlers: HandlerRegistry::new(),
            pending: PendingRequests::new(),
            counters: Counters::default(),
            sink: self.sink,
            timer: Mutex::new(None),
        };
        Ok(IntentBus {
            shared: Arc::new(shared),
            runtime: Mutex::new(None),
        })
    }
}

struct Shared {
    name: String,
    config: BusConfig,
    running: AtomicBool,
    started_at: Mutex<Option<Instant>>,
    queue: BoundedQueue<Arc<Intent>>,
    subscriptions: SubscriptionRegistry,
    handlers: HandlerRegistry,
    history: History,
    pending: PendingRequests,
    counters: Counters,
    sink: Arc<dyn EventSink>,
    timer: Mutex<Option<Timer>>,
}

struct Runtime {
    pump: ThreadGroup,
    pool: WorkerPool,
}

impl Shared {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn emit(&self, event: BusEvent) {
        let recorded = guarded(|| {
            self.sink.record(&event);
            Ok(())
        });
        if let Err(err) = recorded {
            warn!("{}: event sink failed on {}: {err:#}", self.name, event.name());
        }
    }

    fn admit(&self, intent: &Arc<Intent>) -> SubmitOutcome {
        if !self.is_running() {
            return SubmitOutcome::Closed;
        }
        if let Err(err) = intent.transition(IntentState::Queued) {
            debug!("{}: rejected intent {}: {err}", self.name, intent.id());
            return SubmitOutcome::Rejected;
        }
        self.counters.on_published();
        self.emit(BusEvent::received(intent));

        match self.queue.try_push(Arc::clone(intent)) {
            Ok(()) => SubmitOutcome::Accepted,
            Err(_) => {
                if let Err(err) = intent.fail(QUEUE_FULL) {
                    debug!("{}: {err}", self.name);
                }
                self.counters.on_dropped();
                self.emit(BusEvent::dropped(intent, REASON_QUEUE_FULL));
                SubmitOutcome::Dropped
            }
        }
    }

    fn dispatch(&self, intent: Arc<Intent>) -> IntentResult {
        let started = Instant::now();
        if let Err(err) = intent.transition(IntentState::Processing) {
            warn!("{}: dispatching intent {}: {err}", self.name, intent.id());
        }

        let mut failure = FirstFailure::default();
        self.subscriptions.notify(&intent, &mut failure);
        let handled = self.handlers.run(&intent, &mut failure);
        let latency = started.elapsed();

        let result = match failure.into_message() {
            Some(error) => IntentResult::failure(intent.id(), error, latency),
            None => match handled {
                Some(result) => result.with_latency(latency),
                None => IntentResult::success(intent.id(), None, latency),
            },
        };

        let terminal = if result.is_success() {
            intent.complete(result.data().cloned())
        } else {
            intent.fail(result.error().unwrap_or("unknown error"))
        };
        if let Err(err) = terminal {
            warn!("{}: finishing intent {}: {err}", self.name, intent.id());
        }

        self.counters.on_dispatched(result.is_success(), latency);
        self.history.push(Arc::clone(&intent));
        self.emit(BusEvent::processed(&intent, &result));
        if self.pending.resolve(intent.id(), result.clone()) {
            trace!("{}: answered request {}", self.name, intent.id());
        }
        result
    }

    // Fails work that never reached a worker. Returns false if already terminal.
    fn abandon(&self, intent: &Intent) -> bool {
        if intent.fail(BUS_STOPPED).is_err() {
            return false;
        }
        self.counters.on_abandoned();
        self.pending.resolve(
            intent.id(),
            IntentResult::failure(intent.id(), BUS_STOPPED, Duration::ZERO),
        );
        true
    }

    fn uptime_ms(&self) -> u64 {
        self.started_at
            .lock()
            .map(|started| started.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }
}

fn pump(shared: Arc<Shared>, pool: PoolHandle) {
    let interval = shared.config.poll_interval();
    while shared.is_running() {
        let Some(intent) = shared.queue.poll(interval) else {
            continue;
        };
        // Wait for a free worker in poll-sized steps so shutdown stays prompt.
        loop {
            let worker = Arc::clone(&shared);
            let job_intent = Arc::clone(&intent);
            let job: Job = Box::new(move || {
                worker.dispatch(job_intent);
            });
            match pool.execute_within(job, interval) {
                Ok(()) => break,
                Err(SendTimeoutError::Timeout(_)) if shared.is_running() => {}
                Err(_) => {
                    shared.abandon(&intent);
                    break;
                }
            }
        }
    }
    trace!("{}: pump exited", shared.name);
}

/// In-process publish/execute pipeline.
///
/// Producers `publish` or `request` intents; a pump thread moves admitted
/// intents from the bounded queue onto a worker pool, where each one is
/// dispatched to subscribers and then to the handler chain for its type.
///
/// Every method takes `&self`; share the bus behind an `Arc`.
pub struct IntentBus {
    shared: Arc<Shared>,
    runtime: Mutex<Option<Runtime>>,
}

impl IntentBus {
    /// Starts a builder.
    pub fn builder() -> IntentBusBuilder {
        IntentBusBuilder::new()
    }

    /// Builds a stopped bus with `config` and a [`LogEventSink`].
    pub fn new(config: BusConfig) -> BusResult<Self> {
        IntentBusBuilder::new().config(config).build()
    }

    /// Name used for threads and logs.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Active configuration.
    pub fn config(&self) -> &BusConfig {
        &self.shared.config
    }

    /// Whether the bus accepts work.
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Spawns the worker pool, timer, and pump. No-op if already running.
    pub fn start(&self) -> BusResult<()> {
        let mut runtime = self.runtime.lock();
        if runtime.is_some() {
            return Ok(());
        }
        let shared = &self.shared;
        let grace = shared.config.shutdown_grace();

        let workers = shared.config.worker_threads;
        let pool = WorkerPool::spawn(&shared.name, workers, workers)?;
        let timer = match Timer::spawn(&shared.name) {
            Ok(timer) => timer,
            Err(err) => {
                pool.shutdown(Instant::now() + grace);
                return Err(err);
            }
        };
        *shared.timer.lock() = Some(timer);
        shared.running.store(true, Ordering::Release);
        *shared.started_at.lock() = Some(Instant::now());

        let mut pump_thread = ThreadGroup::new(format!("{} pump", shared.name));
        let pump_shared = Arc::clone(shared);
        let handle = pool.handle();
        if let Err(err) = pump_thread.spawn(format!("{}-pump", shared.name), move || {
            pump(pump_shared, handle)
        }) {
            shared.running.store(false, Ordering::Release);
            let deadline = Instant::now() + grace;
            pool.shutdown(deadline);
            if let Some(timer) = shared.timer.lock().take() {
                timer.shutdown(deadline);
            }
            return Err(err);
        }

        *runtime = Some(Runtime {
            pump: pump_thread,
            pool,
        });
        info!(
            "{} started (queue_capacity={}, history_limit={}, workers={})",
            shared.name,
            shared.config.queue_capacity,
            shared.config.history_limit,
            shared.config.worker_threads
        );
        Ok(())
    }

    /// Stops accepting work and shuts the threads down.
    ///
    /// Intents already handed to workers finish dispatching. Intents still in
    /// the queue and unanswered requests fail with [`BUS_STOPPED`]. Threads
    /// still busy after the grace period are detached; the returned report
    /// says which thread groups were.
    pub fn stop(&self) -> ShutdownReport {
        let mut runtime = self.runtime.lock();
        let Some(Runtime { pump, pool }) = runtime.take() else {
            return ShutdownReport::idle();
        };
        let shared = &self.shared;
        shared.running.store(false, Ordering::Release);
        shared.queue.wake_all();

        let deadline = Instant::now() + shared.config.shutdown_grace();
        let pump_joined = pump.join_until(deadline);
        let workers_joined = pool.shutdown(deadline);
        let timer = shared.timer.lock().take();
        let timer_joined = timer.map_or(true, |timer| timer.shutdown(deadline));

        let abandoned = shared
            .queue
            .drain()
            .iter()
            .filter(|intent| shared.abandon(intent))
            .count();
        let unanswered_requests = shared
            .pending
            .resolve_all(|id| IntentResult::failure(id, BUS_STOPPED, Duration::ZERO));
        *shared.started_at.lock() = None;

        let report = ShutdownReport {
            pump_joined,
            workers_joined,
            timer_joined,
            abandoned,
            unanswered_requests,
        };
        if !report.all_joined() {
            warn!("{}: stopped with threads still running", shared.name);
        }
        info!(
            "{} stopped (abandoned={abandoned}, unanswered_requests={unanswered_requests})",
            shared.name
        );
        report
    }

    /// `stop` followed by `start`.
    pub fn restart(&self) -> BusResult<()> {
        let _ = self.stop();
        self.start()
    }

    /// Fire-and-forget submission. Never blocks.
    ///
    /// A full queue marks the intent failed with [`QUEUE_FULL`]; a stopped bus
    /// leaves it untouched.
    pub fn publish(&self, intent: impl Into<Arc<Intent>>) -> SubmitOutcome {
        let intent = intent.into();
        let outcome = self.shared.admit(&intent);
        trace!("{}: publish {} -> {:?}", self.shared.name, intent.id(), outcome);
        outcome
    }

    /// Submits `intent` and returns a future of its result.
    ///
    /// The future resolves once: with the dispatch result, or with a
    /// `"Timeout"` failure after `timeout`, whichever comes first. A timeout
    /// does not interrupt dispatch.
    pub fn request(&self, intent: impl Into<Arc<Intent>>, timeout: Duration) -> IntentResponse {
        let intent = intent.into();
        let id = intent.id().to_string();
        if !self.is_running() {
            return IntentResponse::ready(IntentResult::failure(id, NOT_RUNNING, Duration::ZERO));
        }
        if intent.state() != IntentState::Created {
            return IntentResponse::ready(IntentResult::failure(
                id,
                ALREADY_PUBLISHED,
                Duration::ZERO,
            ));
        }

        let shared = &self.shared;
        let (slot, response) = shared.pending.register(&id);
        let reason = match shared.admit(&intent) {
            SubmitOutcome::Accepted => None,
            SubmitOutcome::Dropped => Some(QUEUE_FULL),
            SubmitOutcome::Rejected => Some(ALREADY_PUBLISHED),
            SubmitOutcome::Closed => Some(NOT_RUNNING),
        };
        if let Some(reason) = reason {
            shared
                .pending
                .resolve(&id, IntentResult::failure(id.as_str(), reason, Duration::ZERO));
            return response;
        }

        let weak: Weak<Shared> = Arc::downgrade(shared);
        let timer_id = id.clone();
        let scheduled = shared.timer.lock().as_ref().is_some_and(|timer| {
            timer.schedule(timeout, move || {
                if slot.complete(IntentResult::timeout(timer_id.as_str(), timeout)) {
                    if let Some(shared) = weak.upgrade() {
                        shared.pending.forget(&timer_id);
                        debug!("{}: request {} timed out", shared.name, timer_id);
                    }
                }
            })
        });
        if !scheduled {
            debug!("{}: no timer for request {}", shared.name, id);
        }
        response
    }

    /// [`IntentBus::request`] with the configured default timeout.
    pub fn request_default(&self, intent: impl Into<Arc<Intent>>) -> IntentResponse {
        self.request(intent, self.shared.config.request_timeout())
    }

    /// Calls `callback` for every intent of `intent_type`.
    pub fn subscribe<F>(&self, intent_type: IntentType, callback: F) -> Subscription
    where
        F: Fn(&Intent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.shared
            .subscriptions
            .subscribe_type(intent_type, Arc::new(callback))
    }

    /// Calls `callback` for every intent `filter` accepts.
    pub fn subscribe_filtered<P, F>(&self, filter: P, callback: F) -> Subscription
    where
        P: Fn(&Intent) -> bool + Send + Sync + 'static,
        F: Fn(&Intent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.shared
            .subscriptions
            .subscribe_filtered(Arc::new(filter), Arc::new(callback))
    }

    /// Calls `callback` for every intent.
    pub fn subscribe_all<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Intent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.shared.subscriptions.subscribe_all(Arc::new(callback))
    }

    /// Appends a closure to the handler chain for `intent_type`.
    pub fn register_handler<F>(&self, intent_type: IntentType, handler: F)
    where
        F: Fn(&Intent) -> anyhow::Result<IntentResult> + Send + Sync + 'static,
    {
        self.shared.handlers.register(intent_type, Arc::new(handler));
    }

    /// Appends a shared [`Handler`] to the chain for `intent_type`.
    pub fn register_shared_handler(&self, intent_type: IntentType, handler: Arc<dyn Handler>) {
        self.shared.handlers.register(intent_type, handler);
    }

    /// Number of handlers registered for `intent_type`.
    pub fn handler_count(&self, intent_type: &IntentType) -> usize {
        self.shared.handlers.count(intent_type)
    }

    /// Number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.shared.subscriptions.active_count()
    }

    /// Removes revoked subscriptions; returns how many were dropped.
    pub fn compact_subscriptions(&self) -> usize {
        self.shared.subscriptions.compact()
    }

    /// Intents waiting in the queue, oldest first.
    pub fn pending_intents(&self) -> Vec<Arc<Intent>> {
        self.shared.queue.snapshot()
    }

    /// The newest `limit` dispatched intents, oldest first.
    pub fn history(&self, limit: usize) -> Vec<Arc<Intent>> {
        self.shared.history.recent(limit)
    }

    /// Dispatched intents still in history that carry `trace_id`.
    pub fn by_trace_id(&self, trace_id: &str) -> Vec<Arc<Intent>> {
        self.shared.history.by_trace_id(trace_id)
    }

    /// Current health classification.
    pub fn health(&self) -> HealthReport {
        let shared = &self.shared;
        HealthReport::assess(
            shared.is_running(),
            shared.uptime_ms(),
            shared.queue.len(),
            shared.queue.capacity(),
        )
    }

    /// Counter and gauge snapshot.
    pub fn metrics(&self) -> BusMetrics {
        let shared = &self.shared;
        let mut metrics = BusMetrics {
            queue_size: shared.queue.len(),
            queue_capacity: shared.queue.capacity(),
            history_size: shared.history.len(),
            pending_requests: shared.pending.len(),
            uptime_ms: shared.uptime_ms(),
            ..BusMetrics::default()
        };
        shared.counters.fill(&mut metrics);
        metrics
    }
}

impl Drop for IntentBus {
    fn drop(&mut self) {
        self.stop();
    }
}
