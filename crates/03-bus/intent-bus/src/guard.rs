use anyhow::anyhow;
use intent::panic_message;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Runs an external callback, turning a panic into an error.
pub(crate) fn guarded<T>(callback: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
    match catch_unwind(AssertUnwindSafe(callback)) {
        Ok(outcome) => outcome,
        Err(panic) => Err(anyhow!("callback panicked: {}", panic_message(panic))),
    }
}

/// Keeps the first error seen while dispatching one intent.
#[derive(Debug, Default)]
pub(crate) struct FirstFailure(Option<String>);

impl FirstFailure {
    pub(crate) fn record(&mut self, err: &anyhow::Error) {
        if self.0.is_none() {
            self.0 = Some(format!("{err:#}"));
        }
    }

    pub(crate) fn into_message(self) -> Option<String> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panics_become_errors() {
        let err = guarded::<()>(|| panic!("exploded")).unwrap_err();
        assert_eq!(err.to_string(), "callback panicked: exploded");
    }

    #[test]
    fn only_the_first_failure_is_kept() {
        let mut failure = FirstFailure::default();
        failure.record(&anyhow!("first"));
        failure.record(&anyhow!("second"));
        assert_eq!(failure.into_message().as_deref(), Some("first"));
    }
}
