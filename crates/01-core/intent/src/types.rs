//! Category, priority, and lifecycle enums for intents.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Discrete work categories an intent can carry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentType {
    /// Liveness ping; usually handled by nobody.
    Heartbeat,
    /// Command line forwarded from an interactive shell.
    ShellCommand,
    /// Ask the kernel to spawn a process.
    ProcessSpawn,
    /// Query the status of a spawned process.
    ProcessStatus,
    /// Inject a thought into an external reasoning component.
    BrainThink,
    /// Ask an external reasoning component for a decision.
    BrainDecide,
    /// Aggregate health across registered components.
    HealthCheck,
    /// Application-defined category.
    Custom(String),
}

impl IntentType {
    /// Stable name used in observability records.
    pub fn name(&self) -> &str {
        match self {
            IntentType::Heartbeat => "HEARTBEAT",
            IntentType::ShellCommand => "SHELL_COMMAND",
            IntentType::ProcessSpawn => "PROCESS_SPAWN",
            IntentType::ProcessStatus => "PROCESS_STATUS",
            IntentType::BrainThink => "BRAIN_THINK",
            IntentType::BrainDecide => "BRAIN_DECIDE",
            IntentType::HealthCheck => "HEALTH_CHECK",
            IntentType::Custom(name) => name,
        }
    }
}

impl fmt::Display for IntentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Priority class for intent scheduling (`Critical` is highest).
///
/// Declaration order is significant: the derived `Ord` ranks
/// `Deferred < Low < Normal < High < Critical`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentPriority {
    /// Below `Low`; runs only when nothing else is ready.
    Deferred,
    /// Background or maintenance work.
    Low,
    /// Default class for ordinary work.
    #[default]
    Normal,
    /// User-facing work that should jump the line.
    High,
    /// Latency-critical work.
    Critical,
}

impl IntentPriority {
    /// All priorities from highest to lowest.
    pub const DESCENDING: [IntentPriority; 5] = [
        IntentPriority::Critical,
        IntentPriority::High,
        IntentPriority::Normal,
        IntentPriority::Low,
        IntentPriority::Deferred,
    ];

    /// Bucket index where `Critical` is 0 and `Deferred` is 4.
    pub fn index(self) -> usize {
        match self {
            IntentPriority::Critical => 0,
            IntentPriority::High => 1,
            IntentPriority::Normal => 2,
            IntentPriority::Low => 3,
            IntentPriority::Deferred => 4,
        }
    }

    /// Cycles through every class, used by load generators.
    pub fn from_ordinal(n: usize) -> Self {
        match n % 5 {
            0 => IntentPriority::Deferred,
            1 => IntentPriority::Low,
            2 => IntentPriority::Normal,
            3 => IntentPriority::High,
            _ => IntentPriority::Critical,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IntentPriority::Deferred => "DEFERRED",
            IntentPriority::Low => "LOW",
            IntentPriority::Normal => "NORMAL",
            IntentPriority::High => "HIGH",
            IntentPriority::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for IntentPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle of an intent: `Created -> Queued -> Processing -> {Completed | Failed}`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentState {
    #[default]
    Created,
    Queued,
    Processing,
    Completed,
    Failed,
}

impl IntentState {
    /// Position along the lifecycle; both terminal states share the last rank.
    pub fn rank(self) -> u8 {
        match self {
            IntentState::Created => 0,
            IntentState::Queued => 1,
            IntentState::Processing => 2,
            IntentState::Completed | IntentState::Failed => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, IntentState::Completed | IntentState::Failed)
    }

    /// Transitions must strictly advance the rank.
    pub fn can_advance_to(self, next: IntentState) -> bool {
        next.rank() > self.rank()
    }
}
