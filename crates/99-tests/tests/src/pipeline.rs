use intent::{Intent, IntentPriority, IntentResult, IntentState, IntentType};
use intent_bus::{BusConfig, BusEvent, IntentBus, RecordingSink, SubmitOutcome};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::support::{init_logging, wait_until, WAIT};

fn recorded_bus(config: BusConfig) -> (IntentBus, Arc<RecordingSink>) {
    init_logging();
    let sink = Arc::new(RecordingSink::new());
    let bus = IntentBus::builder()
        .name("session")
        .config(config)
        .sink(sink.clone())
        .build()
        .unwrap();
    bus.start().unwrap();
    (bus, sink)
}

fn shell(command: &str, priority: IntentPriority, trace_id: &str) -> Arc<Intent> {
    Arc::new(
        Intent::builder(IntentType::ShellCommand)
            .priority(priority)
            .origin("shell")
            .payload("command", command)
            .trace_id(trace_id)
            .build(),
    )
}

#[test]
fn shell_session_reaches_every_listener() {
    let (bus, sink) = recorded_bus(BusConfig::default());
    let audit = Arc::new(Mutex::new(HashSet::new()));
    let urgent = Arc::new(Mutex::new(Vec::new()));
    {
        let audit = Arc::clone(&audit);
        bus.subscribe_all(move |intent| {
            audit.lock().insert(intent.id().to_string());
            Ok(())
        });
    }
    {
        let urgent = Arc::clone(&urgent);
        bus.subscribe_filtered(
            |intent| intent.priority() >= IntentPriority::High,
            move |intent| {
                urgent.lock().push(intent.payload_str("command").map(str::to_string));
                Ok(())
            },
        );
    }
    bus.register_handler(IntentType::ShellCommand, |intent| {
        let command = intent.payload_str("command").unwrap_or_default();
        Ok(IntentResult::success(
            intent.id(),
            Some(json!(format!("ran {command}"))),
            Duration::ZERO,
        ))
    });

    let session = [
        shell("ls", IntentPriority::Normal, "tty-1"),
        shell("reboot", IntentPriority::Critical, "tty-1"),
        shell("uptime", IntentPriority::Low, "tty-2"),
    ];
    for intent in &session {
        assert_eq!(bus.publish(Arc::clone(intent)), SubmitOutcome::Accepted);
    }
    let heartbeat = Arc::new(Intent::new(IntentType::Heartbeat));
    let _ = bus.publish(Arc::clone(&heartbeat));

    assert!(wait_until(|| bus.history(10).len() == 4));
    for intent in &session {
        assert_eq!(intent.state(), IntentState::Completed);
    }
    assert_eq!(session[1].result(), Some(json!("ran reboot")));
    assert_eq!(heartbeat.result(), None);

    assert_eq!(audit.lock().len(), 4);
    assert_eq!(*urgent.lock(), vec![Some("reboot".to_string())]);
    assert_eq!(bus.by_trace_id("tty-1").len(), 2);

    let metrics = bus.metrics();
    assert_eq!((metrics.published, metrics.processed, metrics.failed), (4, 4, 0));
    assert_eq!(sink.count("intent_received"), 4);
    assert_eq!(sink.count("intent_processed"), 4);
}

#[test]
fn events_serialize_as_json_lines() {
    let (bus, sink) = recorded_bus(BusConfig::default().with_worker_threads(1));
    bus.register_handler(IntentType::BrainDecide, |intent| {
        Ok(IntentResult::failure(intent.id(), "no quorum", Duration::ZERO))
    });
    let intent = Arc::new(Intent::new(IntentType::BrainDecide));
    let result = bus.request(Arc::clone(&intent), WAIT).wait();
    assert_eq!(result.error(), Some("no quorum"));

    let lines: Vec<String> = sink
        .events_for(intent.id())
        .iter()
        .map(|event| serde_json::to_string(event).unwrap())
        .collect();
    let parsed: Vec<Value> = lines
        .iter()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[0]["event"], "intent_received");
    assert_eq!(parsed[0]["type"], "BRAIN_DECIDE");
    assert_eq!(parsed[0]["origin"], "unknown");
    assert_eq!(parsed[1]["event"], "intent_processed");
    assert_eq!(parsed[1]["success"], false);
}

#[test]
fn restart_keeps_registrations_and_history() {
    let (bus, sink) = recorded_bus(BusConfig::default().with_worker_threads(1));
    bus.register_handler(IntentType::Custom("PING".into()), |intent| {
        Ok(IntentResult::success(intent.id(), Some(json!("pong")), Duration::ZERO))
    });
    let ping = || Intent::new(IntentType::Custom("PING".into()));

    assert_eq!(bus.request(ping(), WAIT).wait().data(), Some(&json!("pong")));
    bus.restart().unwrap();
    assert!(bus.is_running());
    assert_eq!(bus.request(ping(), WAIT).wait().data(), Some(&json!("pong")));

    assert_eq!(bus.history(10).len(), 2);
    assert_eq!(bus.metrics().processed, 2);
    assert!(sink
        .events()
        .iter()
        .all(|event| !matches!(event, BusEvent::IntentDropped { .. })));
}
