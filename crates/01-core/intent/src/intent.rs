//! Intent descriptor and its lifecycle cell.

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::error::IntentError;
use crate::types::{IntentPriority, IntentState, IntentType};

/// Opaque key/value payload carried by an intent.
pub type Payload = BTreeMap<String, Value>;

const DEFAULT_ORIGIN: &str = "unknown";

#[derive(Debug, Default)]
struct Lifecycle {
    state: IntentState,
    result: Option<Value>,
    error: Option<String>,
}

/// Work descriptor submitted to the bus.
///
/// Everything except the lifecycle is fixed at construction. The lifecycle is
/// only advanced by the bus while dispatching; other components observe it.
#[derive(Debug)]
pub struct Intent {
    id: String,
    intent_type: IntentType,
    priority: IntentPriority,
    origin: String,
    payload: Payload,
    trace_id: Option<String>,
    capability: Option<String>,
    created_at_ms: u64,
    lifecycle: Mutex<Lifecycle>,
}

impl Intent {
    /// Starts a builder for an intent of the given type.
    pub fn builder(intent_type: IntentType) -> IntentBuilder {
        IntentBuilder::new(intent_type)
    }

    /// Shorthand for an intent with default priority, origin, and payload.
    pub fn new(intent_type: IntentType) -> Self {
        IntentBuilder::new(intent_type).build()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn intent_type(&self) -> &IntentType {
        &self.intent_type
    }

    pub fn priority(&self) -> IntentPriority {
        self.priority
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Returns a payload entry when it is a JSON string.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Pass-through capability token; never interpreted here.
    pub fn capability(&self) -> Option<&str> {
        self.capability.as_deref()
    }

    /// Milliseconds since the Unix epoch at construction.
    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }

    pub fn state(&self) -> IntentState {
        self.lifecycle.lock().state
    }

    pub fn result(&self) -> Option<Value> {
        self.lifecycle.lock().result.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.lifecycle.lock().error.clone()
    }

    /// Advances to a non-terminal state. Rank must strictly increase.
    pub fn transition(&self, next: IntentState) -> Result<(), IntentError> {
        let mut lifecycle = self.lifecycle.lock();
        advance(&mut lifecycle, next)
    }

    /// Marks the intent `Completed` and stores its result.
    pub fn complete(&self, result: Option<Value>) -> Result<(), IntentError> {
        let mut lifecycle = self.lifecycle.lock();
        advance(&mut lifecycle, IntentState::Completed)?;
        lifecycle.result = result;
        Ok(())
    }

    /// Marks the intent `Failed` and stores its error.
    pub fn fail(&self, error: impl Into<String>) -> Result<(), IntentError> {
        let mut lifecycle = self.lifecycle.lock();
        advance(&mut lifecycle, IntentState::Failed)?;
        lifecycle.error = Some(error.into());
        Ok(())
    }

    /// Serializable copy of the intent for dashboards and logs.
    pub fn snapshot(&self) -> IntentSnapshot {
        let lifecycle = self.lifecycle.lock();
        IntentSnapshot {
            id: self.id.clone(),
            intent_type: self.intent_type.clone(),
            priority: self.priority,
            origin: self.origin.clone(),
            payload: self.payload.clone(),
            trace_id: self.trace_id.clone(),
            created_at_ms: self.created_at_ms,
            state: lifecycle.state,
            result: lifecycle.result.clone(),
            error: lifecycle.error.clone(),
        }
    }
}

fn advance(lifecycle: &mut Lifecycle, next: IntentState) -> Result<(), IntentError> {
    if !lifecycle.state.can_advance_to(next) {
        return Err(IntentError::InvalidTransition {
            from: lifecycle.state,
            to: next,
        });
    }
    lifecycle.state = next;
    Ok(())
}

/// Point-in-time view of an intent.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IntentSnapshot {
    pub id: String,
    #[serde(rename = "type")]
    pub intent_type: IntentType,
    pub priority: IntentPriority,
    pub origin: String,
    pub payload: Payload,
    pub trace_id: Option<String>,
    pub created_at_ms: u64,
    pub state: IntentState,
    pub result: Option<Value>,
    pub error: Option<String>,
}

/// Builder for [`Intent`].
pub struct IntentBuilder {
    intent_type: IntentType,
    priority: IntentPriority,
    origin: String,
    payload: Payload,
    trace_id: Option<String>,
    capability: Option<String>,
}

impl IntentBuilder {
    pub fn new(intent_type: IntentType) -> Self {
        Self {
            intent_type,
            priority: IntentPriority::default(),
            origin: DEFAULT_ORIGIN.to_string(),
            payload: Payload::new(),
            trace_id: None,
            capability: None,
        }
    }

    pub fn priority(mut self, priority: IntentPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Inserts one payload entry, replacing any previous value for `key`.
    pub fn payload(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn payload_map(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn capability(mut self, token: impl Into<String>) -> Self {
        self.capability = Some(token.into());
        self
    }

    pub fn build(self) -> Intent {
        Intent {
            id: Uuid::new_v4().to_string(),
            intent_type: self.intent_type,
            priority: self.priority,
            origin: self.origin,
            payload: self.payload,
            trace_id: self.trace_id,
            capability: self.capability,
            created_at_ms: now_ms(),
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
