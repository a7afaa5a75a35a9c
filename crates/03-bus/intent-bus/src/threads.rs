//! Named thread groups with bounded joins.

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, warn};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::error::{BusError, BusResult};

// Sends on drop so unwinding threads still report their exit.
struct ExitSignal(Sender<()>);

impl Drop for ExitSignal {
    fn drop(&mut self) {
        let _ = self.0.send(());
    }
}

/// A set of named OS threads that can be joined against a deadline.
///
/// Rust threads cannot be cancelled, so threads still running when the
/// deadline passes are detached and reported.
pub struct ThreadGroup {
    label: String,
    handles: Vec<JoinHandle<()>>,
    exits_tx: Sender<()>,
    exits_rx: Receiver<()>,
}

impl ThreadGroup {
    /// Creates an empty group; `label` prefixes log messages.
    pub fn new(label: impl Into<String>) -> Self {
        let (exits_tx, exits_rx) = unbounded();
        Self {
            label: label.into(),
            handles: Vec::new(),
            exits_tx,
            exits_rx,
        }
    }

    /// Number of threads spawned into the group.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns `true` when no thread has been spawned.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Spawns `body` on a new thread called `name`.
    pub fn spawn<F>(&mut self, name: impl Into<String>, body: F) -> BusResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = name.into();
        let signal = ExitSignal(self.exits_tx.clone());
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let _signal = signal;
                body();
            })
            .map_err(|source| BusError::Spawn { name, source })?;
        self.handles.push(handle);
        Ok(())
    }

    /// Waits until every thread exits or `deadline` passes.
    ///
    /// Returns `true` when all threads were joined.
    pub fn join_until(self, deadline: Instant) -> bool {
        let total = self.handles.len();
        for exited in 0..total {
            if self.exits_rx.recv_deadline(deadline).is_err() {
                warn!(
                    "{}: {} of {} threads still running after grace period; detaching",
                    self.label,
                    total - exited,
                    total
                );
                return false;
            }
        }
        for handle in self.handles {
            if handle.join().is_err() {
                warn!("{}: thread panicked before exit", self.label);
            }
        }
        debug!("{}: joined {} threads", self.label, total);
        true
    }
}
