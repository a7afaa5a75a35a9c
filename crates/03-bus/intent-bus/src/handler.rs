//! Result-producing handlers, chained per intent type.

use arc_swap::ArcSwap;
use intent::{Intent, IntentResult, IntentType};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;

use crate::guard::{guarded, FirstFailure};

/// Produces the authoritative result for an intent.
///
/// Returning a failed [`IntentResult`] lets the next handler in the chain try;
/// returning `Err` (or panicking) marks the intent failed once dispatch ends.
pub trait Handler: Send + Sync {
    /// Handles one intent.
    fn handle(&self, intent: &Intent) -> anyhow::Result<IntentResult>;
}

impl<F> Handler for F
where
    F: Fn(&Intent) -> anyhow::Result<IntentResult> + Send + Sync,
{
    fn handle(&self, intent: &Intent) -> anyhow::Result<IntentResult> {
        self(intent)
    }
}

type Chain = SmallVec<[Arc<dyn Handler>; 4]>;

/// Copy-on-write map of handler chains.
pub struct HandlerRegistry {
    chains: ArcSwap<HashMap<IntentType, Chain>>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self {
            chains: ArcSwap::from_pointee(HashMap::new()),
        }
    }
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `handler` to the chain for `intent_type`.
    pub fn register(&self, intent_type: IntentType, handler: Arc<dyn Handler>) {
        self.chains.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.entry(intent_type.clone())
                .or_insert_with(Chain::new)
                .push(Arc::clone(&handler));
            next
        });
    }

    /// Number of handlers registered for `intent_type`.
    pub fn count(&self, intent_type: &IntentType) -> usize {
        self.chains.load().get(intent_type).map_or(0, |chain| chain.len())
    }

    /// Runs the chain for the intent's type in registration order.
    ///
    /// Stops at the first successful result. Otherwise returns the last
    /// failed result, or `None` when no handler produced one. Errors are
    /// recorded in `failure` and the chain continues.
    pub(crate) fn run(&self, intent: &Intent, failure: &mut FirstFailure) -> Option<IntentResult> {
        let chains = self.chains.load();
        let chain = chains.get(intent.intent_type())?;
        let mut last_failed = None;
        for handler in chain.iter() {
            match guarded(|| handler.handle(intent)) {
                Ok(result) if result.is_success() => return Some(result),
                Ok(result) => last_failed = Some(result),
                Err(err) => failure.record(&err),
            }
        }
        last_failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn ok(intent: &Intent, data: &str) -> anyhow::Result<IntentResult> {
        Ok(IntentResult::success(
            intent.id(),
            Some(json!(data)),
            Duration::ZERO,
        ))
    }

    #[test]
    fn first_success_short_circuits() {
        let registry = HandlerRegistry::new();
        let second_calls = Arc::new(AtomicUsize::new(0));
        registry.register(
            IntentType::ShellCommand,
            Arc::new(|intent: &Intent| ok(intent, "first")),
        );
        {
            let second_calls = Arc::clone(&second_calls);
            registry.register(
                IntentType::ShellCommand,
                Arc::new(move |intent: &Intent| {
                    second_calls.fetch_add(1, Ordering::SeqCst);
                    ok(intent, "second")
                }),
            );
        }

        let intent = Intent::new(IntentType::ShellCommand);
        let result = registry
            .run(&intent, &mut FirstFailure::default())
            .expect("handled");
        assert_eq!(result.data(), Some(&json!("first")));
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
        assert_eq!(registry.count(&IntentType::ShellCommand), 2);
    }

    #[test]
    fn failed_results_fall_through_to_later_handlers() {
        let registry = HandlerRegistry::new();
        registry.register(
            IntentType::BrainDecide,
            Arc::new(|intent: &Intent| -> anyhow::Result<IntentResult> {
                Ok(IntentResult::failure(intent.id(), "not mine", Duration::ZERO))
            }),
        );
        registry.register(
            IntentType::BrainDecide,
            Arc::new(|_: &Intent| -> anyhow::Result<IntentResult> { Err(anyhow!("broken")) }),
        );
        registry.register(
            IntentType::BrainDecide,
            Arc::new(|intent: &Intent| ok(intent, "third")),
        );

        let intent = Intent::new(IntentType::BrainDecide);
        let mut failure = FirstFailure::default();
        let result = registry.run(&intent, &mut failure).expect("handled");
        assert!(result.is_success());
        assert_eq!(failure.into_message().as_deref(), Some("broken"));
    }

    #[test]
    fn unhandled_types_yield_none() {
        let registry = HandlerRegistry::new();
        let intent = Intent::new(IntentType::Heartbeat);
        assert!(registry.run(&intent, &mut FirstFailure::default()).is_none());
    }
}
