use intent_bus::BusError;
use thiserror::Error;

/// Result alias for kernel lifecycle operations.
pub type KernelResult<T> = Result<T, KernelError>;

/// Failures surfaced by kernel construction and lifecycle calls.
#[derive(Debug, Error)]
pub enum KernelError {
    /// A configuration value is out of range.
    #[error("invalid kernel configuration: {0}")]
    InvalidConfig(&'static str),

    /// The loop thread or worker pool could not be started.
    #[error("kernel threads: {0}")]
    Threads(#[from] BusError),
}
