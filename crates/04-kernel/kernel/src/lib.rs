#![deny(missing_docs)]
//! Process execution substrate.
//!
//! A [`Kernel`] owns a swappable [`scheduler::Scheduler`], a fixed worker
//! pool, and a loop thread that moves processes from one to the other while
//! respecting an in-flight limit. [`Kernel::install_handlers`] exposes
//! spawning, status queries, and health over an [`intent_bus::IntentBus`].

mod config;
mod error;
mod handlers;
mod health;
mod kernel;
mod table;
mod tasks;

pub use config::KernelConfig;
pub use error::{KernelError, KernelResult};
pub use handlers::{PROCESS_ID_KEY, PROCESS_NOT_FOUND, TASK_KEY};
pub use health::{KernelHealth, KernelMetrics, DEGRADED_BACKLOG_FACTOR};
pub use kernel::Kernel;
pub use table::{ProcessRecord, ProcessStatus, ProcessTable};
pub use tasks::{Task, TaskRegistry};
