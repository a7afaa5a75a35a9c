//! Structured observability records and the sinks that consume them.

use intent::{Intent, IntentResult};
use log::{info, warn};
use parking_lot::Mutex;
use serde::Serialize;

/// Reason recorded when admission fails on a full queue.
pub const REASON_QUEUE_FULL: &str = "queue_full";

/// Event emitted by the bus at its documented call sites.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BusEvent {
    /// An intent was accepted for admission by `publish` or `request`.
    IntentReceived {
        /// Intent id.
        id: String,
        /// Intent type name.
        #[serde(rename = "type")]
        intent_type: String,
        /// Priority name.
        priority: String,
        /// Submitter.
        origin: String,
    },
    /// Admission failed and the intent was marked failed.
    IntentDropped {
        /// Intent id.
        id: String,
        /// Machine-readable reason.
        reason: String,
    },
    /// Dispatch finished with a final outcome.
    IntentProcessed {
        /// Intent id.
        id: String,
        /// Intent type name.
        #[serde(rename = "type")]
        intent_type: String,
        /// Whether the intent completed.
        success: bool,
        /// Latency measured from the start of dispatch.
        latency_ms: u64,
    },
}

impl BusEvent {
    pub(crate) fn received(intent: &Intent) -> Self {
        BusEvent::IntentReceived {
            id: intent.id().to_string(),
            intent_type: intent.intent_type().to_string(),
            priority: intent.priority().to_string(),
            origin: intent.origin().to_string(),
        }
    }

    pub(crate) fn dropped(intent: &Intent, reason: &str) -> Self {
        BusEvent::IntentDropped {
            id: intent.id().to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn processed(intent: &Intent, result: &IntentResult) -> Self {
        BusEvent::IntentProcessed {
            id: intent.id().to_string(),
            intent_type: intent.intent_type().to_string(),
            success: result.is_success(),
            latency_ms: result.latency_ms(),
        }
    }

    /// Event name as it appears in logs.
    pub fn name(&self) -> &'static str {
        match self {
            BusEvent::IntentReceived { .. } => "intent_received",
            BusEvent::IntentDropped { .. } => "intent_dropped",
            BusEvent::IntentProcessed { .. } => "intent_processed",
        }
    }

    /// Id of the intent the event describes.
    pub fn intent_id(&self) -> &str {
        match self {
            BusEvent::IntentReceived { id, .. }
            | BusEvent::IntentDropped { id, .. }
            | BusEvent::IntentProcessed { id, .. } => id,
        }
    }
}

/// Destination for [`BusEvent`]s. Called from producer and worker threads.
pub trait EventSink: Send + Sync {
    /// Consumes one event. Must not block for long.
    fn record(&self, event: &BusEvent);
}

/// Writes every event as one `log` record with `key=value` fields.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn record(&self, event: &BusEvent) {
        match event {
            BusEvent::IntentReceived {
                id,
                intent_type,
                priority,
                origin,
            } => info!(
                "intent_received id={id} type={intent_type} priority={priority} origin={origin}"
            ),
            BusEvent::IntentDropped { id, reason } => {
                warn!("intent_dropped id={id} reason={reason}")
            }
            BusEvent::IntentProcessed {
                id,
                intent_type,
                success,
                latency_ms,
            } => {
                if *success {
                    info!("intent_processed id={id} type={intent_type} success=true latency_ms={latency_ms}")
                } else {
                    warn!("intent_processed id={id} type={intent_type} success=false latency_ms={latency_ms}")
                }
            }
        }
    }
}

/// Keeps events in memory, oldest first.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<BusEvent>>,
}

impl RecordingSink {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies every recorded event.
    pub fn events(&self) -> Vec<BusEvent> {
        self.events.lock().clone()
    }

    /// Recorded events for one intent.
    pub fn events_for(&self, intent_id: &str) -> Vec<BusEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.intent_id() == intent_id)
            .cloned()
            .collect()
    }

    /// Number of recorded events called `name`.
    pub fn count(&self, name: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| event.name() == name)
            .count()
    }
}

impl EventSink for RecordingSink {
    fn record(&self, event: &BusEvent) {
        self.events.lock().push(event.clone());
    }
}
