//! Named tasks that `PROCESS_SPAWN` intents can start.

use log::info;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared body of a named task. Each spawned process calls it once.
pub type Task = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// Registry of task bodies keyed by name.
///
/// Unknown names fall back to a task that only logs its name.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, Task>>,
}

impl TaskRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces the body for `name`.
    pub fn register(&self, name: impl Into<String>, task: Task) {
        self.tasks.write().insert(name.into(), task);
    }

    /// Whether `name` has a registered body.
    pub fn contains(&self, name: &str) -> bool {
        self.tasks.read().contains_key(name)
    }

    /// Body to run for `name`.
    pub fn resolve(&self, name: &str) -> Task {
        if let Some(task) = self.tasks.read().get(name) {
            return Arc::clone(task);
        }
        let name = name.to_string();
        Arc::new(move || {
            info!("task {name}");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn registered_tasks_resolve_to_their_body() {
        let registry = TaskRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        registry.register(
            "count",
            Arc::new(move || {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        assert!(registry.contains("count"));
        registry.resolve("count")().unwrap();
        registry.resolve("count")().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unknown_tasks_succeed_without_side_effects() {
        let registry = TaskRegistry::new();
        assert!(!registry.contains("backup"));
        assert!(registry.resolve("backup")().is_ok());
    }
}
