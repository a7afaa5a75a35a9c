#![deny(missing_docs)]
//! In-process intent bus.
//!
//! [`IntentBus`] accepts [`intent::Intent`]s under bounded capacity, hands
//! them to a worker pool through a dedicated pump thread, and dispatches
//! each one in a fixed order:
//!
//! 1. global subscribers,
//! 2. subscribers for the intent's type,
//! 3. predicate subscribers,
//! 4. the handler chain for the intent's type.
//!
//! Subscribers and handlers are external code. Their errors and panics are
//! caught per intent, so one bad callback never poisons the bus.
//!
//! The building blocks (queue, history ring, thread groups, worker pool,
//! timer, response futures) are public so the kernel and tools can reuse
//! them.

mod bus;
mod config;
mod error;
mod events;
mod guard;
mod handler;
mod health;
mod history;
mod metrics;
mod outcome;
mod pool;
mod queue;
mod response;
mod subscription;
mod threads;
mod timer;

pub use bus::{
    IntentBus, IntentBusBuilder, ALREADY_PUBLISHED, BUS_STOPPED, NOT_RUNNING, QUEUE_FULL,
};
pub use config::BusConfig;
pub use error::{BusError, BusResult};
pub use events::{BusEvent, EventSink, LogEventSink, RecordingSink, REASON_QUEUE_FULL};
pub use handler::{Handler, HandlerRegistry};
pub use health::{HealthReport, HealthStatus};
pub use history::History;
pub use metrics::BusMetrics;
pub use outcome::{ShutdownReport, SubmitOutcome};
pub use pool::{Job, PoolHandle, WorkerPool};
pub use queue::BoundedQueue;
pub use response::{IntentResponse, PendingRequests, ResponseSlot, RESPONSE_DROPPED};
pub use subscription::{IntentFilter, SubscriberFn, Subscription, SubscriptionRegistry};
pub use threads::ThreadGroup;
pub use timer::Timer;
