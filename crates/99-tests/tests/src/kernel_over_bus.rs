use intent::{Intent, IntentPriority, IntentType};
use intent_bus::{BusConfig, IntentBus};
use kernel::{Kernel, KernelConfig, ProcessStatus, PROCESS_ID_KEY, PROCESS_NOT_FOUND, TASK_KEY};
use parking_lot::Mutex;
use scheduler::{ProcessId, StrategyKind};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::support::{init_logging, wait_until, WAIT};

fn bus() -> Arc<IntentBus> {
    init_logging();
    let bus = IntentBus::new(BusConfig::default().with_worker_threads(2)).unwrap();
    bus.start().unwrap();
    Arc::new(bus)
}

fn kernel(strategy: StrategyKind) -> Kernel {
    let config = KernelConfig::default()
        .with_worker_threads(1)
        .with_max_in_flight(1)
        .with_idle_backoff(Duration::from_millis(1));
    Kernel::new(config, strategy.instantiate()).unwrap()
}

fn spawn_request(task: &str, priority: IntentPriority) -> Intent {
    Intent::builder(IntentType::ProcessSpawn)
        .priority(priority)
        .origin("shell")
        .payload(TASK_KEY, task)
        .build()
}

fn status_request(id: &str) -> Intent {
    Intent::builder(IntentType::ProcessStatus)
        .payload(PROCESS_ID_KEY, id)
        .build()
}

#[test]
fn spawn_then_query_status_over_the_bus() {
    let bus = bus();
    let kernel = kernel(StrategyKind::Priority);
    let runs = Arc::new(AtomicUsize::new(0));
    {
        let runs = Arc::clone(&runs);
        kernel.register_task("count", move || {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }
    kernel.install_handlers(&bus);
    kernel.start().unwrap();

    let spawned = bus
        .request(spawn_request("count", IntentPriority::High), WAIT)
        .wait();
    assert!(spawned.is_success(), "spawn: {spawned:?}");
    let process_id = spawned
        .data()
        .and_then(|data| data.as_str())
        .expect("process id")
        .to_string();

    assert!(kernel.wait_idle(WAIT));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(
        kernel.status(&ProcessId::from(process_id.as_str())),
        Some(ProcessStatus::Completed)
    );

    let status = bus.request(status_request(&process_id), WAIT).wait();
    assert_eq!(status.data(), Some(&json!("COMPLETED")));

    let missing = bus.request(status_request("no-such-process"), WAIT).wait();
    assert_eq!(missing.error(), Some(PROCESS_NOT_FOUND));
}

#[test]
fn health_check_reports_every_component() {
    let bus = bus();
    let kernel = kernel(StrategyKind::Priority);
    kernel.install_handlers(&bus);
    kernel.start().unwrap();

    let report = bus
        .request(Intent::new(IntentType::HealthCheck), WAIT)
        .wait();
    let data = report.data().expect("health payload");
    assert_eq!(data["kernel"]["status"], "HEALTHY");
    assert_eq!(data["kernel"]["scheduler"], "Priority");
    assert_eq!(data[bus.name()]["status"], "HEALTHY");
    assert_eq!(data[bus.name()]["queue_capacity"], 100);

    kernel.stop();
    let report = bus
        .request(Intent::new(IntentType::HealthCheck), WAIT)
        .wait();
    assert_eq!(report.data().unwrap()["kernel"]["status"], "UNHEALTHY");
}

#[test]
fn swapped_strategy_orders_processes_spawned_over_the_bus() {
    let bus = bus();
    let kernel = kernel(StrategyKind::RoundRobin);
    let order = Arc::new(Mutex::new(Vec::new()));
    for priority in IntentPriority::DESCENDING {
        let order = Arc::clone(&order);
        kernel.register_task(priority.name(), move || {
            order.lock().push(priority);
            Ok(())
        });
    }
    kernel.install_handlers(&bus);

    let submitted = [
        IntentPriority::Deferred,
        IntentPriority::Normal,
        IntentPriority::Critical,
        IntentPriority::Low,
        IntentPriority::High,
    ];
    for priority in submitted {
        let spawned = bus
            .request(spawn_request(priority.name(), priority), WAIT)
            .wait();
        assert!(spawned.is_success());
    }
    assert_eq!(kernel.metrics().scheduler_metrics.current_queue_size, 5);

    kernel.set_scheduler(StrategyKind::Priority.instantiate());
    kernel.start().unwrap();
    assert!(kernel.wait_idle(WAIT));
    assert_eq!(*order.lock(), IntentPriority::DESCENDING.to_vec());

    let metrics = kernel.metrics();
    assert_eq!(metrics.scheduler, "Priority");
    assert_eq!(metrics.scheduler_metrics.completed, 5);
    assert_eq!(metrics.tracked_processes, 5);
}

#[test]
fn failing_tasks_surface_through_status_queries() {
    let bus = bus();
    let kernel = kernel(StrategyKind::Predictive);
    kernel.register_task("explode", || anyhow::bail!("exit status 2"));
    kernel.install_handlers(&bus);
    kernel.start().unwrap();

    let spawned = bus
        .request(spawn_request("explode", IntentPriority::Normal), WAIT)
        .wait();
    let process_id = spawned.data().and_then(|d| d.as_str()).unwrap().to_string();

    assert!(wait_until(|| {
        let status = bus.request(status_request(&process_id), WAIT).wait();
        status.data() == Some(&json!("FAILED"))
    }));
    let record = kernel.process(&ProcessId::from(process_id.as_str())).unwrap();
    assert_eq!(record.error.as_deref(), Some("exit status 2"));
    assert_eq!(kernel.metrics().scheduler_metrics.failed, 1);
}
