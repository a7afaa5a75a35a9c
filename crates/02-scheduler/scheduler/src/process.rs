//! Schedulable unit wrapping an intent and its executable work.

use anyhow::anyhow;
use intent::{panic_message, Intent, IntentPriority};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Executable work carried by a process. Runs at most once.
pub type Action = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

/// Identifier assigned to every process at construction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(String);

impl ProcessId {
    fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrowed string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProcessId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A unit of work owned by exactly one party at a time: the submitter, then
/// the scheduler, then the caller of `next()`, then the scheduler again.
pub struct Process {
    id: ProcessId,
    intent: Arc<Intent>,
    action: Option<Action>,
    submitted_at: Option<Instant>,
    started_at: Option<Instant>,
    completed_at: Option<Instant>,
}

impl Process {
    /// Wraps `intent` with the work to execute.
    pub fn new<F>(intent: Arc<Intent>, action: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        Self {
            id: ProcessId::generate(),
            intent,
            action: Some(Box::new(action)),
            submitted_at: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Process identifier.
    pub fn id(&self) -> &ProcessId {
        &self.id
    }

    /// The intent this process executes.
    pub fn intent(&self) -> &Arc<Intent> {
        &self.intent
    }

    /// Shorthand for the intent's priority.
    pub fn priority(&self) -> IntentPriority {
        self.intent.priority()
    }

    /// When a scheduler first accepted this process.
    pub fn submitted_at(&self) -> Option<Instant> {
        self.submitted_at
    }

    /// When execution began.
    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    /// When execution finished.
    pub fn completed_at(&self) -> Option<Instant> {
        self.completed_at
    }

    /// Time spent queued so far (or until execution started).
    pub fn waited(&self) -> Duration {
        match self.submitted_at {
            Some(submitted) => self
                .started_at
                .unwrap_or_else(Instant::now)
                .saturating_duration_since(submitted),
            None => Duration::ZERO,
        }
    }

    /// Time spent executing; zero if the process never started.
    pub fn executed(&self) -> Duration {
        match self.started_at {
            Some(started) => self
                .completed_at
                .unwrap_or_else(Instant::now)
                .saturating_duration_since(started),
            None => Duration::ZERO,
        }
    }

    /// Executes the action, stamping start and completion times.
    ///
    /// Panics inside the action are caught and reported as errors.
    pub fn run(&mut self) -> anyhow::Result<()> {
        let action = self
            .action
            .take()
            .ok_or_else(|| anyhow!("process {} already ran", self.id))?;
        self.started_at = Some(Instant::now());
        let outcome = match catch_unwind(AssertUnwindSafe(action)) {
            Ok(result) => result,
            Err(panic) => Err(anyhow!("process panicked: {}", panic_message(panic))),
        };
        self.completed_at = Some(Instant::now());
        outcome
    }

    pub(crate) fn mark_submitted(&mut self) {
        if self.submitted_at.is_none() {
            self.submitted_at = Some(Instant::now());
        }
    }

    pub(crate) fn mark_finished(&mut self) {
        if self.completed_at.is_none() {
            self.completed_at = Some(Instant::now());
        }
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("id", &self.id)
            .field("intent", &self.intent.id())
            .field("priority", &self.priority())
            .field("ran", &self.action.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intent::IntentType;

    fn intent() -> Arc<Intent> {
        Arc::new(Intent::new(IntentType::ProcessSpawn))
    }

    #[test]
    fn run_executes_once() {
        let mut process = Process::new(intent(), || Ok(()));
        assert!(process.run().is_ok());
        assert!(process.started_at().is_some());
        assert!(process.completed_at().is_some());

        let err = process.run().unwrap_err();
        assert!(err.to_string().contains("already ran"));
    }

    #[test]
    fn panics_become_errors() {
        let mut process = Process::new(intent(), || panic!("boom"));
        let err = process.run().unwrap_err();
        assert_eq!(err.to_string(), "process panicked: boom");
        assert!(process.completed_at().is_some());
    }

    #[test]
    fn formatted_panics_keep_their_message() {
        let disk = "sda1";
        let mut process = Process::new(intent(), move || panic!("{disk} on fire"));
        let err = process.run().unwrap_err();
        assert_eq!(err.to_string(), "process panicked: sda1 on fire");
    }

    #[test]
    fn submission_stamp_is_sticky() {
        let mut process = Process::new(intent(), || Ok(()));
        process.mark_submitted();
        let first = process.submitted_at();
        std::thread::sleep(Duration::from_millis(2));
        process.mark_submitted();
        assert_eq!(process.submitted_at(), first);
    }
}
