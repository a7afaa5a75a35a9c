use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Error text for requests resolved by the timer.
pub const TIMEOUT_ERROR: &str = "Timeout";

/// Outcome of processing one intent. Immutable once built.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IntentResult {
    intent_id: String,
    success: bool,
    data: Option<Value>,
    error: Option<String>,
    latency_ms: u64,
}

impl IntentResult {
    pub fn success(intent_id: impl Into<String>, data: Option<Value>, latency: Duration) -> Self {
        Self {
            intent_id: intent_id.into(),
            success: true,
            data,
            error: None,
            latency_ms: latency.as_millis() as u64,
        }
    }

    pub fn failure(
        intent_id: impl Into<String>,
        error: impl Into<String>,
        latency: Duration,
    ) -> Self {
        Self {
            intent_id: intent_id.into(),
            success: false,
            data: None,
            error: Some(error.into()),
            latency_ms: latency.as_millis() as u64,
        }
    }

    /// Synthetic failure used when a request outlives its deadline.
    pub fn timeout(intent_id: impl Into<String>, timeout: Duration) -> Self {
        Self::failure(intent_id, TIMEOUT_ERROR, timeout)
    }

    pub fn intent_id(&self) -> &str {
        &self.intent_id
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn latency_ms(&self) -> u64 {
        self.latency_ms
    }

    pub fn is_timeout(&self) -> bool {
        self.error.as_deref() == Some(TIMEOUT_ERROR)
    }

    /// Same outcome re-stamped with the dispatcher's measured latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency_ms = latency.as_millis() as u64;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_never_carries_error() {
        let result = IntentResult::success("a", Some(json!({"k": 1})), Duration::from_millis(3));
        assert!(result.is_success());
        assert!(result.error().is_none());
        assert_eq!(result.latency_ms(), 3);
    }

    #[test]
    fn timeout_is_a_failure_without_data() {
        let result = IntentResult::timeout("b", Duration::from_millis(50));
        assert!(!result.is_success());
        assert!(result.data().is_none());
        assert_eq!(result.error(), Some("Timeout"));
        assert!(result.is_timeout());
        assert_eq!(result.latency_ms(), 50);
    }
}
