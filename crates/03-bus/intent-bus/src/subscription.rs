//! Side-effecting subscriber callbacks keyed globally, by type, or by predicate.

use arc_swap::ArcSwap;
use intent::{Intent, IntentType};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::guard::{guarded, FirstFailure};

/// Subscriber callback. Errors are recorded on the intent being dispatched.
pub type SubscriberFn = Arc<dyn Fn(&Intent) -> anyhow::Result<()> + Send + Sync>;

/// Predicate deciding whether a filtered subscriber sees an intent.
pub type IntentFilter = Arc<dyn Fn(&Intent) -> bool + Send + Sync>;

/// Revocation handle returned by every `subscribe*` call.
///
/// Dropping the handle leaves the subscription in place.
#[derive(Clone, Debug)]
pub struct Subscription {
    active: Arc<AtomicBool>,
}

impl Subscription {
    /// Stops future deliveries. Idempotent.
    pub fn unsubscribe(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Whether deliveries are still enabled.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

#[derive(Clone)]
struct Entry {
    active: Arc<AtomicBool>,
    callback: SubscriberFn,
    filter: Option<IntentFilter>,
}

impl Entry {
    fn new(callback: SubscriberFn, filter: Option<IntentFilter>) -> (Self, Subscription) {
        let active = Arc::new(AtomicBool::new(true));
        let handle = Subscription {
            active: Arc::clone(&active),
        };
        (
            Self {
                active,
                callback,
                filter,
            },
            handle,
        )
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn deliver(&self, intent: &Intent, failure: &mut FirstFailure) {
        if !self.is_active() {
            return;
        }
        if let Some(filter) = &self.filter {
            match guarded(|| Ok(filter(intent))) {
                Ok(true) => {}
                Ok(false) => return,
                Err(err) => {
                    failure.record(&err);
                    return;
                }
            }
        }
        if let Err(err) = guarded(|| (self.callback)(intent)) {
            failure.record(&err);
        }
    }
}

fn retain_active(entries: &[Entry]) -> Vec<Entry> {
    entries.iter().filter(|e| e.is_active()).cloned().collect()
}

/// Copy-on-write subscriber lists.
///
/// Dispatch reads a snapshot without locking; registration swaps in a new
/// list, dropping revoked entries along the way.
pub struct SubscriptionRegistry {
    global: ArcSwap<Vec<Entry>>,
    by_type: ArcSwap<HashMap<IntentType, Vec<Entry>>>,
    filtered: ArcSwap<Vec<Entry>>,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self {
            global: ArcSwap::from_pointee(Vec::new()),
            by_type: ArcSwap::from_pointee(HashMap::new()),
            filtered: ArcSwap::from_pointee(Vec::new()),
        }
    }
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers every intent to `callback`.
    pub fn subscribe_all(&self, callback: SubscriberFn) -> Subscription {
        let (entry, handle) = Entry::new(callback, None);
        append(&self.global, entry);
        handle
    }

    /// Delivers intents of `intent_type` to `callback`.
    pub fn subscribe_type(&self, intent_type: IntentType, callback: SubscriberFn) -> Subscription {
        let (entry, handle) = Entry::new(callback, None);
        self.by_type.rcu(|current| {
            let mut next = HashMap::with_capacity(current.len() + 1);
            for (ty, entries) in current.iter() {
                next.insert(ty.clone(), retain_active(entries));
            }
            next.entry(intent_type.clone())
                .or_insert_with(Vec::new)
                .push(entry.clone());
            next
        });
        handle
    }

    /// Delivers intents accepted by `filter` to `callback`.
    pub fn subscribe_filtered(&self, filter: IntentFilter, callback: SubscriberFn) -> Subscription {
        let (entry, handle) = Entry::new(callback, Some(filter));
        append(&self.filtered, entry);
        handle
    }

    /// Invokes matching subscribers: global, then by type, then filtered,
    /// each in registration order. Failures are recorded and skipped.
    pub(crate) fn notify(&self, intent: &Intent, failure: &mut FirstFailure) {
        for entry in self.global.load().iter() {
            entry.deliver(intent, failure);
        }
        if let Some(entries) = self.by_type.load().get(intent.intent_type()) {
            for entry in entries {
                entry.deliver(intent, failure);
            }
        }
        for entry in self.filtered.load().iter() {
            entry.deliver(intent, failure);
        }
    }

    /// Number of subscriptions that are still active.
    pub fn active_count(&self) -> usize {
        let global = self.global.load().iter().filter(|e| e.is_active()).count();
        let typed: usize = self
            .by_type
            .load()
            .values()
            .map(|entries| entries.iter().filter(|e| e.is_active()).count())
            .sum();
        let filtered = self.filtered.load().iter().filter(|e| e.is_active()).count();
        global + typed + filtered
    }

    /// Physically removes revoked subscriptions. Returns how many were dropped.
    pub fn compact(&self) -> usize {
        let mut removed = 0;
        for list in [&self.global, &self.filtered] {
            let previous = list.rcu(|current| retain_active(current));
            removed += previous.iter().filter(|e| !e.is_active()).count();
        }
        let previous = self.by_type.rcu(|current| {
            current
                .iter()
                .map(|(ty, entries)| (ty.clone(), retain_active(entries)))
                .filter(|(_, entries)| !entries.is_empty())
                .collect::<HashMap<_, _>>()
        });
        removed
            + previous
                .values()
                .flat_map(|entries| entries.iter())
                .filter(|e| !e.is_active())
                .count()
    }
}

fn append(list: &ArcSwap<Vec<Entry>>, entry: Entry) {
    list.rcu(|current| {
        let mut next = retain_active(current);
        next.push(entry.clone());
        next
    });
}
