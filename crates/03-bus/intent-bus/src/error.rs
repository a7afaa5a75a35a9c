use thiserror::Error;

/// Result alias for bus lifecycle operations.
pub type BusResult<T> = Result<T, BusError>;

/// Failures surfaced by bus construction and lifecycle calls.
///
/// Per-intent failures never use this type; they are reported through
/// [`intent::IntentResult`] and the intent's own error field.
#[derive(Debug, Error)]
pub enum BusError {
    /// A configuration value is out of range.
    #[error("invalid bus configuration: {0}")]
    InvalidConfig(&'static str),

    /// The operating system refused to start a thread.
    #[error("failed to spawn thread {name}: {source}")]
    Spawn {
        /// Name the thread would have carried.
        name: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
}
