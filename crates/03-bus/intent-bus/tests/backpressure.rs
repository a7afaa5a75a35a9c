//! Bounded admission: drops under burst load and shutdown of queued work.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use intent::{Intent, IntentResult, IntentState, IntentType};
use intent_bus::{
    BusConfig, HealthStatus, IntentBus, RecordingSink, SubmitOutcome, BUS_STOPPED, QUEUE_FULL,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(5);

fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    done()
}

struct Gate {
    release: Option<Sender<()>>,
    entered: Receiver<()>,
}

impl Gate {
    fn wait_entered(&self) {
        self.entered
            .recv_timeout(WAIT)
            .expect("handler never started");
    }

    fn open(&mut self) {
        self.release.take();
    }
}

/// One worker whose shell handler parks until the gate opens.
fn gated_bus(config: BusConfig) -> (IntentBus, Arc<RecordingSink>, Gate) {
    let _ = env_logger::builder().is_test(true).try_init();
    let sink = Arc::new(RecordingSink::new());
    let bus = IntentBus::builder()
        .name("gated")
        .config(config.with_worker_threads(1).with_poll_interval(Duration::from_millis(10)))
        .sink(sink.clone())
        .build()
        .expect("valid config");

    let (release_tx, release_rx) = bounded::<()>(0);
    let (entered_tx, entered_rx) = unbounded::<()>();
    bus.register_handler(IntentType::ShellCommand, move |intent| {
        let _ = entered_tx.send(());
        let _ = release_rx.recv();
        Ok(IntentResult::success(intent.id(), None, Duration::ZERO))
    });
    bus.start().expect("bus starts");

    let gate = Gate {
        release: Some(release_tx),
        entered: entered_rx,
    };
    (bus, sink, gate)
}

fn burst(bus: &IntentBus, count: usize) -> Vec<(Arc<Intent>, SubmitOutcome)> {
    (0..count)
        .map(|_| {
            let intent = Arc::new(Intent::new(IntentType::ShellCommand));
            let outcome = bus.publish(Arc::clone(&intent));
            (intent, outcome)
        })
        .collect()
}

fn accepted(outcomes: &[(Arc<Intent>, SubmitOutcome)]) -> usize {
    outcomes
        .iter()
        .filter(|(_, outcome)| outcome.is_accepted())
        .count()
}

/// A stalled consumer bounds accepted work to queue, backlog, and pump hand-off.
#[test]
fn burst_beyond_capacity_drops_without_blocking() {
    let capacity = 4;
    let (bus, sink, mut gate) = gated_bus(BusConfig::default().with_queue_capacity(capacity));

    assert!(bus.publish(Intent::new(IntentType::ShellCommand)).is_accepted());
    gate.wait_entered();

    let started = Instant::now();
    let first = burst(&bus, 30);
    let first_accepted = accepted(&first);
    assert!(first_accepted >= capacity, "accepted {first_accepted}");

    // The pump moves one intent into the worker backlog and holds another.
    assert!(wait_until(|| bus.pending_intents().len() == first_accepted - 2));
    let second = burst(&bus, 10);
    assert!(
        started.elapsed() < Duration::from_secs(1),
        "publish blocked for {:?}",
        started.elapsed()
    );
    assert_eq!(first_accepted + accepted(&second), capacity + 2);
    assert_eq!(bus.pending_intents().len(), capacity);
    assert_eq!(bus.health().status, HealthStatus::Degraded);

    let rejected = bus
        .request(Intent::new(IntentType::ShellCommand), WAIT)
        .wait();
    assert_eq!(rejected.error(), Some(QUEUE_FULL));

    let dropped: Vec<_> = first
        .iter()
        .chain(second.iter())
        .filter(|(_, outcome)| *outcome == SubmitOutcome::Dropped)
        .collect();
    assert_eq!(dropped.len(), 40 - (capacity + 2));
    for (intent, _) in &dropped {
        assert_eq!(intent.state(), IntentState::Failed);
        assert_eq!(intent.error().as_deref(), Some(QUEUE_FULL));
    }
    let metrics = bus.metrics();
    assert_eq!(metrics.dropped as usize, dropped.len() + 1);
    assert_eq!(sink.count("intent_dropped"), dropped.len() + 1);

    gate.open();
    assert!(wait_until(|| bus.history(100).len() == capacity + 3));
    assert_eq!(bus.metrics().processed, (capacity + 3) as u64);
    assert!(first
        .iter()
        .chain(second.iter())
        .filter(|(_, outcome)| outcome.is_accepted())
        .all(|(intent, _)| intent.state() == IntentState::Completed));
    assert_eq!(bus.health().status, HealthStatus::Healthy);
}

/// Stopping fails queued intents and answers every outstanding request.
#[test]
fn stop_fails_queued_work_and_outstanding_requests() {
    let config = BusConfig::default()
        .with_queue_capacity(16)
        .with_shutdown_grace(Duration::from_millis(100));
    let (bus, _sink, mut gate) = gated_bus(config);

    let blocked = bus.request(Intent::new(IntentType::ShellCommand), WAIT);
    gate.wait_entered();

    // Fills the backlog slot and the pump hand-off, leaving the rest queued.
    let fillers = burst(&bus, 3);
    assert_eq!(accepted(&fillers), 3);
    let queued = Arc::new(Intent::new(IntentType::ShellCommand));
    let queued_response = bus.request(Arc::clone(&queued), WAIT);
    assert!(wait_until(|| bus.pending_intents().len() == 2));

    let stopping = Instant::now();
    let report = bus.stop();
    assert!(stopping.elapsed() < Duration::from_secs(2));
    assert!(report.pump_joined && report.timer_joined);
    assert!(!report.workers_joined);
    assert!(!report.all_joined());
    assert_eq!(report.abandoned, 2);
    assert!(!bus.is_running());

    assert_eq!(queued_response.wait().error(), Some(BUS_STOPPED));
    assert_eq!(queued.state(), IntentState::Failed);
    assert_eq!(queued.error().as_deref(), Some(BUS_STOPPED));
    assert_eq!(blocked.wait().error(), Some(BUS_STOPPED));
    assert_eq!(bus.metrics().pending_requests, 0);
    assert_eq!(bus.health().status, HealthStatus::Unhealthy);

    // The parked worker was detached and still finishes its own intent.
    gate.open();
    assert!(wait_until(|| bus.history(10).len() >= 1));
}
