use serde::Serialize;

/// Admission outcome reported by `publish`.
///
/// `publish` never blocks and never returns an error; callers that care can
/// inspect the outcome, everyone else can ignore it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Intent entered the bounded queue.
    Accepted,
    /// Queue was full; the intent was marked failed.
    Dropped,
    /// Intent had already been published; nothing changed.
    Rejected,
    /// Bus is not running; nothing changed.
    Closed,
}

impl SubmitOutcome {
    /// Whether the intent is now queued.
    pub fn is_accepted(self) -> bool {
        self == SubmitOutcome::Accepted
    }
}

/// What `stop` managed to wind down within the grace period.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Pump thread exited and was joined.
    pub pump_joined: bool,
    /// Every worker thread exited and was joined.
    pub workers_joined: bool,
    /// Timer thread exited and was joined.
    pub timer_joined: bool,
    /// Queued intents failed because they never reached a worker.
    pub abandoned: usize,
    /// Requests resolved with a stop failure.
    pub unanswered_requests: usize,
}

impl ShutdownReport {
    /// Report for a bus that was not running.
    pub fn idle() -> Self {
        Self {
            pump_joined: true,
            workers_joined: true,
            timer_joined: true,
            abandoned: 0,
            unanswered_requests: 0,
        }
    }

    /// `false` when any thread group was detached.
    pub fn all_joined(&self) -> bool {
        self.pump_joined && self.workers_joined && self.timer_joined
    }
}
