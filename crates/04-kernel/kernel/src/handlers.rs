//! Bus handlers that expose the kernel to intent producers.

use intent::{Intent, IntentResult, IntentType};
use intent_bus::{Handler, IntentBus};
use log::debug;
use scheduler::{Process, ProcessId};
use serde_json::json;
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::kernel::{Core, Kernel};

/// Failure returned by the status handler for unknown ids.
pub const PROCESS_NOT_FOUND: &str = "process not found";
/// Payload key naming the task a `PROCESS_SPAWN` intent starts.
pub const TASK_KEY: &str = "task";
/// Payload key naming the process a `PROCESS_STATUS` intent asks about.
pub const PROCESS_ID_KEY: &str = "process_id";

struct SpawnHandler {
    core: Arc<Core>,
}

impl Handler for SpawnHandler {
    fn handle(&self, intent: &Intent) -> anyhow::Result<IntentResult> {
        let task_name = intent.payload_str(TASK_KEY).unwrap_or("anonymous");
        let task = self.core.tasks.resolve(task_name);
        let process = Process::new(Arc::new(process_intent(intent)), move || task());
        let id = self.core.spawn(process);
        debug!("intent {} spawned process {id} ({task_name})", intent.id());
        Ok(IntentResult::success(
            intent.id(),
            Some(json!(id.as_str())),
            Duration::ZERO,
        ))
    }
}

// The bus owns the original's lifecycle; the process runs a copy.
fn process_intent(intent: &Intent) -> Intent {
    let mut builder = Intent::builder(intent.intent_type().clone())
        .priority(intent.priority())
        .origin(intent.origin())
        .payload_map(intent.payload().clone());
    if let Some(trace_id) = intent.trace_id() {
        builder = builder.trace_id(trace_id);
    }
    if let Some(token) = intent.capability() {
        builder = builder.capability(token);
    }
    builder.build()
}

struct StatusHandler {
    core: Arc<Core>,
}

impl Handler for StatusHandler {
    fn handle(&self, intent: &Intent) -> anyhow::Result<IntentResult> {
        let status = intent
            .payload_str(PROCESS_ID_KEY)
            .and_then(|id| self.core.table.status(&ProcessId::from(id)));
        Ok(match status {
            Some(status) => {
                IntentResult::success(intent.id(), Some(json!(status.name())), Duration::ZERO)
            }
            None => IntentResult::failure(intent.id(), PROCESS_NOT_FOUND, Duration::ZERO),
        })
    }
}

struct HealthHandler {
    core: Arc<Core>,
    bus: Weak<IntentBus>,
}

impl Handler for HealthHandler {
    fn handle(&self, intent: &Intent) -> anyhow::Result<IntentResult> {
        let mut report = json!({ "kernel": serde_json::to_value(self.core.health())? });
        if let Some(bus) = self.bus.upgrade() {
            report[bus.name()] = serde_json::to_value(bus.health())?;
        }
        Ok(IntentResult::success(intent.id(), Some(report), Duration::ZERO))
    }
}

impl Kernel {
    /// Registers the kernel's handlers on `bus`:
    ///
    /// * `PROCESS_SPAWN` spawns the task named by payload `task` and answers
    ///   with the process id.
    /// * `PROCESS_STATUS` answers with the status of payload `process_id`, or
    ///   fails with [`PROCESS_NOT_FOUND`].
    /// * `HEALTH_CHECK` answers with kernel and bus health keyed by component.
    pub fn install_handlers(&self, bus: &Arc<IntentBus>) {
        let core = self.core();
        bus.register_shared_handler(
            IntentType::ProcessSpawn,
            Arc::new(SpawnHandler {
                core: Arc::clone(core),
            }),
        );
        bus.register_shared_handler(
            IntentType::ProcessStatus,
            Arc::new(StatusHandler {
                core: Arc::clone(core),
            }),
        );
        bus.register_shared_handler(
            IntentType::HealthCheck,
            Arc::new(HealthHandler {
                core: Arc::clone(core),
                bus: Arc::downgrade(bus),
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KernelConfig;
    use intent::IntentPriority;
    use scheduler::StrategyKind;

    #[test]
    fn process_intents_copy_scheduling_fields() {
        let original = Intent::builder(IntentType::ProcessSpawn)
            .priority(IntentPriority::Critical)
            .origin("shell")
            .payload(TASK_KEY, "backup")
            .trace_id("t-1")
            .build();
        let copy = process_intent(&original);
        assert_ne!(copy.id(), original.id());
        assert_eq!(copy.priority(), IntentPriority::Critical);
        assert_eq!(copy.origin(), "shell");
        assert_eq!(copy.payload_str(TASK_KEY), Some("backup"));
        assert_eq!(copy.trace_id(), Some("t-1"));
    }

    #[test]
    fn status_handler_reports_unknown_ids() {
        let kernel = Kernel::new(
            KernelConfig::default(),
            StrategyKind::RoundRobin.instantiate(),
        )
        .unwrap();
        let handler = StatusHandler {
            core: Arc::clone(kernel.core()),
        };

        let missing = Intent::builder(IntentType::ProcessStatus)
            .payload(PROCESS_ID_KEY, "nope")
            .build();
        let result = handler.handle(&missing).unwrap();
        assert_eq!(result.error(), Some(PROCESS_NOT_FOUND));

        let id = kernel.spawn(Intent::new(IntentType::ProcessSpawn), || Ok(()));
        let known = Intent::builder(IntentType::ProcessStatus)
            .payload(PROCESS_ID_KEY, id.as_str())
            .build();
        let result = handler.handle(&known).unwrap();
        assert_eq!(result.data(), Some(&json!("PENDING")));
    }
}
