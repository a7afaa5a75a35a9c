//! Every spawned process is accounted for exactly once.

use intent::{Intent, IntentPriority, IntentType};
use kernel::{Kernel, KernelConfig, ProcessStatus};
use proptest::prelude::*;
use scheduler::StrategyKind;
use std::time::Duration;

fn strategy() -> impl Strategy<Value = StrategyKind> {
    prop_oneof![
        Just(StrategyKind::RoundRobin),
        Just(StrategyKind::Priority),
        Just(StrategyKind::Predictive),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Completed plus failed equals spawned, whatever the strategy or mix.
    #[test]
    fn outcomes_match_spawns(
        kind in strategy(),
        plan in prop::collection::vec((0usize..5, any::<bool>()), 1..40),
    ) {
        let config = KernelConfig::default()
            .with_worker_threads(2)
            .with_idle_backoff(Duration::from_millis(1));
        let kernel = Kernel::new(config, kind.instantiate()).unwrap();
        kernel.start().unwrap();

        let mut ids = Vec::with_capacity(plan.len());
        for (ordinal, succeeds) in &plan {
            let intent = Intent::builder(IntentType::ProcessSpawn)
                .priority(IntentPriority::from_ordinal(*ordinal))
                .build();
            let succeeds = *succeeds;
            let id = kernel.spawn(intent, move || {
                if succeeds {
                    Ok(())
                } else {
                    Err(anyhow::anyhow!("planned failure"))
                }
            });
            ids.push((id, succeeds));
        }
        prop_assert!(kernel.wait_idle(Duration::from_secs(10)));

        let expected_failures = plan.iter().filter(|(_, ok)| !ok).count() as u64;
        let metrics = kernel.metrics().scheduler_metrics;
        prop_assert_eq!(metrics.submitted, plan.len() as u64);
        prop_assert_eq!(metrics.failed, expected_failures);
        prop_assert_eq!(metrics.completed + metrics.failed, plan.len() as u64);
        prop_assert_eq!(metrics.current_queue_size, 0);

        for (id, succeeds) in &ids {
            let expected = if *succeeds { ProcessStatus::Completed } else { ProcessStatus::Failed };
            prop_assert_eq!(kernel.status(id), Some(expected));
        }
        kernel.stop();
    }
}
