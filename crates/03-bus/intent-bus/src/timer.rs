//! Single-thread deadline timer used for request timeouts.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use crate::error::BusResult;
use crate::threads::ThreadGroup;

type Task = Box<dyn FnOnce() + Send + 'static>;

struct Entry {
    deadline: Instant,
    seq: u64,
    task: Task,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.deadline, self.seq).cmp(&(other.deadline, other.seq))
    }
}

/// Runs scheduled tasks on one dedicated thread once their deadline passes.
///
/// Tasks scheduled for the same instant fire in scheduling order. Dropping
/// the timer discards tasks that have not fired yet.
pub struct Timer {
    tx: Sender<(Instant, Task)>,
    thread: ThreadGroup,
}

impl Timer {
    /// Starts the timer thread.
    pub fn spawn(label: &str) -> BusResult<Self> {
        let (tx, rx) = unbounded();
        let mut thread = ThreadGroup::new(format!("{label} timer"));
        thread.spawn(format!("{label}-timer"), move || run(rx))?;
        Ok(Self { tx, thread })
    }

    /// Runs `task` on the timer thread after `delay`.
    ///
    /// Returns `false` if the timer thread has exited.
    pub fn schedule<F>(&self, delay: Duration, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let deadline = Instant::now() + delay;
        self.tx.send((deadline, Box::new(task))).is_ok()
    }

    /// Stops the thread, dropping pending tasks, and joins it until `deadline`.
    pub fn shutdown(self, deadline: Instant) -> bool {
        drop(self.tx);
        self.thread.join_until(deadline)
    }
}

fn run(rx: Receiver<(Instant, Task)>) {
    let mut heap: BinaryHeap<Reverse<Entry>> = BinaryHeap::new();
    let mut seq = 0u64;
    loop {
        let received = match heap.peek() {
            Some(Reverse(next)) => rx.recv_deadline(next.deadline),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok((deadline, task)) => {
                heap.push(Reverse(Entry {
                    deadline,
                    seq,
                    task,
                }));
                seq += 1;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return,
        }
        let now = Instant::now();
        while heap.peek().is_some_and(|Reverse(next)| next.deadline <= now) {
            if let Some(Reverse(entry)) = heap.pop() {
                (entry.task)();
            }
        }
    }
}
