//! Single-assignment response futures for `request`.

use futures::channel::oneshot;
use futures::executor::block_on;
use intent::IntentResult;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

/// Error text used if the completing side disappears without answering.
pub const RESPONSE_DROPPED: &str = "response dropped";

/// Write side of a response. The first `complete` wins; later calls are no-ops.
pub struct ResponseSlot {
    tx: Mutex<Option<oneshot::Sender<IntentResult>>>,
}

impl ResponseSlot {
    /// Completes the response. Returns `true` only for the winning call.
    pub fn complete(&self, result: IntentResult) -> bool {
        match self.tx.lock().take() {
            // A dropped receiver still counts as resolved.
            Some(tx) => {
                let _ = tx.send(result);
                true
            }
            None => false,
        }
    }

    /// Whether some caller already completed the slot.
    pub fn is_completed(&self) -> bool {
        self.tx.lock().is_none()
    }
}

/// Read side of a response; resolves to exactly one [`IntentResult`].
pub struct IntentResponse {
    intent_id: String,
    rx: oneshot::Receiver<IntentResult>,
}

impl IntentResponse {
    /// Creates a connected slot/response pair.
    pub fn pair(intent_id: impl Into<String>) -> (Arc<ResponseSlot>, IntentResponse) {
        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(ResponseSlot {
            tx: Mutex::new(Some(tx)),
        });
        let response = IntentResponse {
            intent_id: intent_id.into(),
            rx,
        };
        (slot, response)
    }

    /// A response that is already resolved.
    pub fn ready(result: IntentResult) -> IntentResponse {
        let (slot, response) = IntentResponse::pair(result.intent_id().to_string());
        slot.complete(result);
        response
    }

    /// Id of the intent this response belongs to.
    pub fn intent_id(&self) -> &str {
        &self.intent_id
    }

    /// Blocks the calling thread until the response resolves.
    pub fn wait(self) -> IntentResult {
        block_on(self)
    }

    /// Returns the result if it has already arrived.
    pub fn try_result(&mut self) -> Option<IntentResult> {
        match self.rx.try_recv() {
            Ok(result) => result,
            Err(oneshot::Canceled) => Some(self.dropped()),
        }
    }

    fn dropped(&self) -> IntentResult {
        IntentResult::failure(self.intent_id.clone(), RESPONSE_DROPPED, Duration::ZERO)
    }
}

impl Future for IntentResponse {
    type Output = IntentResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<IntentResult> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(self.dropped()),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Outstanding requests keyed by intent id.
#[derive(Default)]
pub struct PendingRequests {
    slots: Mutex<HashMap<String, Arc<ResponseSlot>>>,
}

impl PendingRequests {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a response for `intent_id`.
    pub fn register(&self, intent_id: &str) -> (Arc<ResponseSlot>, IntentResponse) {
        let (slot, response) = IntentResponse::pair(intent_id);
        self.slots
            .lock()
            .insert(intent_id.to_string(), Arc::clone(&slot));
        (slot, response)
    }

    /// Completes and forgets the response for `intent_id`, if any.
    ///
    /// Returns `true` when this call resolved the response.
    pub fn resolve(&self, intent_id: &str, result: IntentResult) -> bool {
        let slot = self.slots.lock().remove(intent_id);
        slot.is_some_and(|slot| slot.complete(result))
    }

    /// Forgets `intent_id` without completing it.
    pub fn forget(&self, intent_id: &str) {
        self.slots.lock().remove(intent_id);
    }

    /// Resolves every outstanding response with `make(intent_id)`.
    pub fn resolve_all(&self, make: impl Fn(&str) -> IntentResult) -> usize {
        let drained: Vec<_> = self.slots.lock().drain().collect();
        drained
            .into_iter()
            .filter(|(id, slot)| slot.complete(make(id)))
            .count()
    }

    /// Number of unresolved responses.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Returns `true` when nothing is outstanding.
    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}
