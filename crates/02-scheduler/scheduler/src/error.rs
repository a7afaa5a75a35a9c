use thiserror::Error;

/// Errors surfaced while selecting a scheduling strategy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// The name did not match any known strategy.
    #[error("unknown scheduler strategy: {0}")]
    UnknownStrategy(String),
}
