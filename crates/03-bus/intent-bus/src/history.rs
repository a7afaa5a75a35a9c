//! Bounded ring of finished intents, newest last.

use intent::Intent;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Bounded FIFO record of dispatched intents.
pub struct History {
    entries: Mutex<VecDeque<Arc<Intent>>>,
    limit: usize,
}

impl History {
    /// Creates an empty ring retaining at most `limit` intents.
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(limit.min(1024))),
            limit,
        }
    }

    /// Appends `intent`, evicting the oldest entries past the limit.
    pub fn push(&self, intent: Arc<Intent>) {
        let mut entries = self.entries.lock();
        entries.push_back(intent);
        while entries.len() > self.limit {
            entries.pop_front();
        }
    }

    /// The newest `limit` entries, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<Arc<Intent>> {
        let entries = self.entries.lock();
        let skip = entries.len().saturating_sub(limit);
        entries.iter().skip(skip).cloned().collect()
    }

    /// Every retained entry carrying `trace_id`, oldest first.
    pub fn by_trace_id(&self, trace_id: &str) -> Vec<Arc<Intent>> {
        self.entries
            .lock()
            .iter()
            .filter(|intent| intent.trace_id() == Some(trace_id))
            .cloned()
            .collect()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Configured capacity.
    pub fn limit(&self) -> usize {
        self.limit
    }
}
