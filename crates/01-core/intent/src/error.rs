use thiserror::Error;

use crate::types::IntentState;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntentError {
    #[error("invalid intent transition {from:?} -> {to:?}")]
    InvalidTransition { from: IntentState, to: IntentState },
}
