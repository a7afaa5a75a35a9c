//! Bookkeeping for every process the kernel has spawned.

use intent::IntentPriority;
use parking_lot::Mutex;
use scheduler::{Process, ProcessId};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::fmt;

/// Where a process is in its life.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessStatus {
    /// Waiting in the scheduler.
    Pending,
    /// Handed to a worker.
    Running,
    /// Action returned `Ok`.
    Completed,
    /// Action returned an error or panicked.
    Failed,
}

impl ProcessStatus {
    /// Upper-case name used in handler responses.
    pub fn name(self) -> &'static str {
        match self {
            ProcessStatus::Pending => "PENDING",
            ProcessStatus::Running => "RUNNING",
            ProcessStatus::Completed => "COMPLETED",
            ProcessStatus::Failed => "FAILED",
        }
    }

    /// `Completed` or `Failed`.
    pub fn is_finished(self) -> bool {
        matches!(self, ProcessStatus::Completed | ProcessStatus::Failed)
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Externally visible view of one tracked process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProcessRecord {
    /// Process id.
    pub id: String,
    /// Id of the intent the process executes.
    pub intent_id: String,
    /// Intent type name.
    pub intent_type: String,
    /// Scheduling priority.
    pub priority: IntentPriority,
    /// Current status.
    pub status: ProcessStatus,
    /// Failure message once the process has failed.
    pub error: Option<String>,
}

impl ProcessRecord {
    fn pending(process: &Process) -> Self {
        let intent = process.intent();
        Self {
            id: process.id().to_string(),
            intent_id: intent.id().to_string(),
            intent_type: intent.intent_type().to_string(),
            priority: process.priority(),
            status: ProcessStatus::Pending,
            error: None,
        }
    }
}

/// Thread-safe map from process id to its record.
///
/// With a retention limit, only the newest `retention` finished records are
/// kept; older ones are forgotten as new processes finish. Pending and
/// running records are never evicted.
#[derive(Default)]
pub struct ProcessTable {
    inner: Mutex<TableInner>,
    retention: Option<usize>,
}

#[derive(Default)]
struct TableInner {
    records: HashMap<ProcessId, ProcessRecord>,
    // Finish order, oldest first.
    finished: VecDeque<ProcessId>,
}

impl ProcessTable {
    /// Creates an empty table that keeps every record until pruned.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty table keeping at most `retention` finished records.
    pub fn with_retention(retention: Option<usize>) -> Self {
        Self {
            inner: Mutex::default(),
            retention,
        }
    }

    /// Finished-record limit, if any.
    pub fn retention(&self) -> Option<usize> {
        self.retention
    }

    /// Starts tracking `process` as pending.
    pub fn track(&self, process: &Process) {
        self.inner
            .lock()
            .records
            .insert(process.id().clone(), ProcessRecord::pending(process));
    }

    /// Moves a tracked process to `status`; unknown ids are ignored.
    pub fn set_status(&self, id: &ProcessId, status: ProcessStatus, error: Option<String>) {
        let mut inner = self.inner.lock();
        let Some(record) = inner.records.get_mut(id) else {
            return;
        };
        let was_finished = record.status.is_finished();
        record.status = status;
        record.error = error;
        if status.is_finished() && !was_finished {
            inner.finished.push_back(id.clone());
            if let Some(limit) = self.retention {
                while inner.finished.len() > limit {
                    if let Some(oldest) = inner.finished.pop_front() {
                        inner.records.remove(&oldest);
                    }
                }
            }
        }
    }

    /// Record for `id`, if tracked.
    pub fn get(&self, id: &ProcessId) -> Option<ProcessRecord> {
        self.inner.lock().records.get(id).cloned()
    }

    /// Status for `id`, if tracked.
    pub fn status(&self, id: &ProcessId) -> Option<ProcessStatus> {
        self.inner.lock().records.get(id).map(|record| record.status)
    }

    /// Number of tracked processes.
    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    /// Returns `true` when nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().records.is_empty()
    }

    /// Number of tracked processes in `status`.
    pub fn count(&self, status: ProcessStatus) -> usize {
        self.inner
            .lock()
            .records
            .values()
            .filter(|record| record.status == status)
            .count()
    }

    /// Forgets finished processes; returns how many were removed.
    pub fn prune_finished(&self) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.records.len();
        inner.records.retain(|_, record| !record.status.is_finished());
        inner.finished.clear();
        before - inner.records.len()
    }
}
