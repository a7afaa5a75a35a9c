#![deny(missing_docs)]
//! Pluggable process schedulers.
//!
//! A [`Scheduler`] owns queued [`Process`]es and decides which one runs next.
//! Three interchangeable strategies ship here:
//! * [`RoundRobinScheduler`] – submission order, the benchmarking baseline.
//! * [`PriorityScheduler`] – highest [`intent::IntentPriority`] first, FIFO within a class.
//! * [`PredictiveScheduler`] – highest score from an external [`Scorer`].
//!
//! [`SchedulerSlot`] lets a running system replace its strategy without
//! losing queued work.

mod error;
mod metrics;
mod predictive;
mod priority;
mod process;
mod round_robin;
mod slot;
mod strategy;

pub use error::SchedulerError;
pub use metrics::SchedulerMetrics;
pub use predictive::{AgingScorer, PredictiveScheduler, Scorer};
pub use priority::{PQueues, PriorityScheduler};
pub use process::{Action, Process, ProcessId};
pub use round_robin::RoundRobinScheduler;
pub use slot::SchedulerSlot;
pub use strategy::{Scheduler, StrategyKind};
