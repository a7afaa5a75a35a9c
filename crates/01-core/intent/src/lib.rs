//! Canonical intent primitives shared by the bus, schedulers, and kernel.
//!
//! The `intent` crate intentionally stays small. It defines the work
//! descriptor that producers submit, the lifecycle it moves through while the
//! bus dispatches it, and the result shape handed back to requesters.

/// Lifecycle transition errors.
pub mod error;
/// Intent descriptor, builder, and lifecycle cell.
pub mod intent;
/// Readable text for caught panics.
pub mod panic;
/// Result produced once per processed intent.
pub mod result;
/// Category, priority, and state enums.
pub mod types;

pub use crate::error::IntentError;
pub use crate::intent::{Intent, IntentBuilder, IntentSnapshot, Payload};
pub use crate::panic::panic_message;
pub use crate::result::{IntentResult, TIMEOUT_ERROR};
pub use crate::types::{IntentPriority, IntentState, IntentType};
