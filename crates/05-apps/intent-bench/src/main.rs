//! Command-line harness for comparing schedulers and stressing the intent bus.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use intent::{Intent, IntentPriority, IntentResult, IntentType};
use intent_bus::{BusConfig, IntentBus, RecordingSink, SubmitOutcome};
use kernel::{Kernel, KernelConfig};
use log::{info, warn};
use scheduler::StrategyKind;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Text rendering helpers used by the CLI commands.
mod render {
    use intent::IntentResult;
    use intent_bus::{BusMetrics, HealthReport, ShutdownReport};
    use scheduler::SchedulerMetrics;
    use serde::Serialize;
    use serde_json::Value;
    use std::fmt::Write;
    use std::time::Duration;

    /// One row of the scheduler comparison.
    pub struct StrategyRow {
        pub name: &'static str,
        pub metrics: SchedulerMetrics,
        pub elapsed: Duration,
    }

    /// Admission outcomes counted while flooding a bus.
    #[derive(Default)]
    pub struct Admission {
        pub accepted: usize,
        pub dropped: usize,
        pub publish_time: Duration,
    }

    /// One start/publish/stop round of the lifecycle run.
    #[derive(Debug, Serialize)]
    pub struct Cycle {
        pub cycle: usize,
        pub accepted: usize,
        pub processed: u64,
        pub shutdown: ShutdownReport,
    }

    impl Cycle {
        /// Thread groups this round left detached.
        pub fn detached(&self) -> usize {
            let s = &self.shutdown;
            [s.pump_joined, s.workers_joined, s.timer_joined]
                .iter()
                .filter(|joined| !**joined)
                .count()
        }
    }

    /// Verdict and details of one benchmark, as saved with `--json`.
    #[derive(Debug, Serialize)]
    pub struct BenchRecord {
        pub benchmark: &'static str,
        pub passed: bool,
        pub details: Value,
    }

    /// Format the scheduler comparison table.
    pub fn strategy_table(rows: &[StrategyRow]) -> String {
        let mut out = String::new();
        writeln!(
            out,
            "{:<16}{:>10}{:>10}{:>8}{:>14}{:>14}{:>12}",
            "strategy", "submitted", "completed", "failed", "avg_wait_ms", "avg_exec_ms", "elapsed_ms"
        )
        .expect("write header");
        for row in rows {
            let m = &row.metrics;
            writeln!(
                out,
                "{:<16}{:>10}{:>10}{:>8}{:>14.3}{:>14.3}{:>12}",
                row.name,
                m.submitted,
                m.completed,
                m.failed,
                m.avg_wait_ms,
                m.avg_execution_ms,
                row.elapsed.as_millis()
            )
            .expect("write row");
        }
        out
    }

    /// Format the outcome of a flood run.
    pub fn bus_summary(admission: &Admission, metrics: &BusMetrics, health: &HealthReport) -> String {
        let mut out = String::new();
        writeln!(
            out,
            "admission: accepted={} dropped={} publish_ms={}",
            admission.accepted,
            admission.dropped,
            admission.publish_time.as_millis()
        )
        .expect("write admission");
        writeln!(
            out,
            "bus: published={} processed={} failed={} dropped={} avg_latency_ms={:.2}",
            metrics.published,
            metrics.processed,
            metrics.failed,
            metrics.dropped,
            metrics.avg_latency_ms
        )
        .expect("write metrics");
        writeln!(
            out,
            "health: {:?} ({}) queue={}/{}",
            health.status, health.message, health.queue_size, health.queue_capacity
        )
        .expect("write health");
        out
    }

    /// Format one request outcome.
    pub fn request_line(result: &IntentResult, waited: Duration) -> String {
        match result.error() {
            Some(error) => format!("request failed after {}ms: {error}\n", waited.as_millis()),
            None => format!(
                "request succeeded after {}ms (latency_ms={})\n",
                waited.as_millis(),
                result.latency_ms()
            ),
        }
    }

    /// Format the lifecycle rounds, one line each plus a total.
    pub fn lifecycle_summary(cycles: &[Cycle]) -> String {
        let mut out = String::new();
        for cycle in cycles {
            writeln!(
                out,
                "cycle {}: accepted={} processed={} abandoned={} detached={}",
                cycle.cycle,
                cycle.accepted,
                cycle.processed,
                cycle.shutdown.abandoned,
                cycle.detached()
            )
            .expect("write cycle");
        }
        let detached: usize = cycles.iter().map(Cycle::detached).sum();
        writeln!(out, "cycles={} detached_thread_groups={detached}", cycles.len())
            .expect("write total");
        out
    }

    /// One-line verdict printed after every benchmark.
    pub fn verdict(record: &BenchRecord) -> String {
        let word = if record.passed { "PASS" } else { "FAIL" };
        format!("{word} {}\n", record.benchmark)
    }
}

/// Benchmark scheduling strategies and exercise bus backpressure.
#[derive(Parser, Debug)]
#[command(author, version, about = "Intent bus and scheduler benchmarks", long_about = None)]
struct Cli {
    /// Also save the benchmark verdict and details to this JSON file.
    #[arg(long, global = true)]
    json: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the same workload through every scheduling strategy.
    Schedulers {
        /// Processes submitted per strategy.
        #[arg(long, default_value_t = 1_000)]
        tasks: usize,
        /// Kernel worker threads.
        #[arg(long, default_value_t = 4)]
        workers: usize,
        /// Simulated work per process, in microseconds.
        #[arg(long, default_value_t = 200)]
        work_us: u64,
        /// Only run this strategy (roundrobin, priority, predictive).
        #[arg(long)]
        strategy: Option<StrategyKind>,
    },
    /// Flood a bus with more intents than it can queue.
    Backpressure {
        /// Bounded queue capacity.
        #[arg(long, default_value_t = 10)]
        capacity: usize,
        /// Intents published in one burst.
        #[arg(long, default_value_t = 100)]
        publish: usize,
        /// Bus worker threads.
        #[arg(long, default_value_t = 1)]
        workers: usize,
        /// Time each handler invocation takes, in milliseconds.
        #[arg(long, default_value_t = 5)]
        handler_ms: u64,
    },
    /// Race a slow handler against a request timeout.
    Request {
        /// Request timeout in milliseconds.
        #[arg(long, default_value_t = 50)]
        timeout_ms: u64,
        /// Time the handler takes, in milliseconds.
        #[arg(long, default_value_t = 500)]
        handler_ms: u64,
    },
    /// Start, load, and stop one bus repeatedly, checking every thread is joined.
    Lifecycle {
        /// Start/stop rounds.
        #[arg(long, default_value_t = 20)]
        cycles: usize,
        /// Intents published per round.
        #[arg(long, default_value_t = 50)]
        publish: usize,
        /// Bus worker threads.
        #[arg(long, default_value_t = 4)]
        workers: usize,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let record = match cli.command {
        Command::Schedulers {
            tasks,
            workers,
            work_us,
            strategy,
        } => run_schedulers(tasks, workers, Duration::from_micros(work_us), strategy)?,
        Command::Backpressure {
            capacity,
            publish,
            workers,
            handler_ms,
        } => run_backpressure(capacity, publish, workers, Duration::from_millis(handler_ms))?,
        Command::Request {
            timeout_ms,
            handler_ms,
        } => run_request(
            Duration::from_millis(timeout_ms),
            Duration::from_millis(handler_ms),
        )?,
        Command::Lifecycle {
            cycles,
            publish,
            workers,
        } => run_lifecycle(cycles, publish, workers)?,
    };

    print!("{}", render::verdict(&record));
    if let Some(path) = &cli.json {
        save_json(path, &record)?;
        info!("saved results to {}", path.display());
    }
    if !record.passed {
        bail!("{} benchmark failed", record.benchmark);
    }
    Ok(())
}

fn save_json(path: &Path, record: &render::BenchRecord) -> Result<()> {
    let text = serde_json::to_string_pretty(record).context("encoding results")?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

/// `unit * count`, rejecting counts and products that do not fit.
fn scaled(unit: Duration, count: usize, what: &str) -> Result<Duration> {
    let count = u32::try_from(count).with_context(|| format!("{what}: {count} is too large"))?;
    unit.checked_mul(count)
        .with_context(|| format!("{what}: {unit:?} x {count} overflows"))
}

/// Deadline `base + slack` from now, rejecting overflow.
fn deadline_after(base: Duration, slack: Duration, what: &str) -> Result<Instant> {
    base.checked_add(slack)
        .and_then(|budget| Instant::now().checked_add(budget))
        .with_context(|| format!("{what}: deadline overflows"))
}

fn run_schedulers(
    tasks: usize,
    workers: usize,
    work: Duration,
    only: Option<StrategyKind>,
) -> Result<render::BenchRecord> {
    let kinds: Vec<StrategyKind> = match only {
        Some(kind) => vec![kind],
        None => StrategyKind::ALL.to_vec(),
    };
    let budget = scaled(work, tasks, "schedulers budget")?
        .checked_add(Duration::from_secs(30))
        .context("schedulers budget overflows")?;

    let mut rows = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let config = KernelConfig::default().with_worker_threads(workers);
        let kernel = Kernel::new(config, kind.instantiate())
            .with_context(|| format!("building kernel for {kind}"))?;
        for n in 0..tasks {
            let intent = Intent::builder(IntentType::ProcessSpawn)
                .priority(IntentPriority::from_ordinal(n % IntentPriority::DESCENDING.len()))
                .origin("intent-bench")
                .build();
            kernel.spawn(intent, move || {
                thread::sleep(work);
                Ok(())
            });
        }

        let started = Instant::now();
        kernel.start().with_context(|| format!("starting kernel for {kind}"))?;
        if !kernel.wait_idle(budget) {
            bail!("{kind} did not drain {tasks} processes within {budget:?}");
        }
        let elapsed = started.elapsed();
        kernel.stop();
        info!("{kind} finished in {elapsed:?}");

        rows.push(render::StrategyRow {
            name: kind.name(),
            metrics: kernel.metrics().scheduler_metrics,
            elapsed,
        });
    }

    print!("{}", render::strategy_table(&rows));
    let passed = rows
        .iter()
        .all(|row| row.metrics.completed + row.metrics.failed == row.metrics.submitted);
    let details: Vec<_> = rows
        .iter()
        .map(|row| {
            json!({
                "strategy": row.name,
                "metrics": row.metrics,
                "elapsed_ms": row.elapsed.as_millis() as u64,
            })
        })
        .collect();
    Ok(render::BenchRecord {
        benchmark: "schedulers",
        passed,
        details: json!(details),
    })
}

fn bench_bus(config: BusConfig) -> Result<IntentBus> {
    let bus = IntentBus::builder()
        .name("bench-bus")
        .config(config)
        .sink(Arc::new(RecordingSink::new()))
        .build()
        .context("building bus")?;
    bus.start().context("starting bus")?;
    Ok(bus)
}

fn run_backpressure(
    capacity: usize,
    publish: usize,
    workers: usize,
    handler_time: Duration,
) -> Result<render::BenchRecord> {
    let config = BusConfig::default()
        .with_queue_capacity(capacity)
        .with_worker_threads(workers);
    let bus = bench_bus(config)?;
    let flood = IntentType::Custom("BENCH".into());
    bus.register_handler(flood.clone(), move |intent| {
        thread::sleep(handler_time);
        Ok(IntentResult::success(intent.id(), None, Duration::ZERO))
    });

    let mut admission = render::Admission::default();
    let started = Instant::now();
    for _ in 0..publish {
        match bus.publish(Intent::new(flood.clone())) {
            SubmitOutcome::Accepted => admission.accepted += 1,
            SubmitOutcome::Dropped => admission.dropped += 1,
            other => bail!("unexpected admission outcome {other:?}"),
        }
    }
    admission.publish_time = started.elapsed();
    let under_load = bus.health();

    let drain = scaled(handler_time, publish, "backpressure drain")?;
    let deadline = deadline_after(drain, Duration::from_secs(10), "backpressure drain")?;
    while bus.metrics().processed < admission.accepted as u64 {
        if Instant::now() >= deadline {
            bail!("bus did not drain {} accepted intents", admission.accepted);
        }
        thread::sleep(Duration::from_millis(5));
    }

    let metrics = bus.metrics();
    print!("{}", render::bus_summary(&admission, &metrics, &under_load));
    let _ = bus.stop();
    Ok(render::BenchRecord {
        benchmark: "backpressure",
        passed: admission.accepted + admission.dropped == publish
            && metrics.dropped == admission.dropped as u64,
        details: json!({
            "accepted": admission.accepted,
            "dropped": admission.dropped,
            "publish_ms": admission.publish_time.as_millis() as u64,
            "metrics": metrics,
            "health_under_load": under_load,
        }),
    })
}

fn run_request(timeout: Duration, handler_time: Duration) -> Result<render::BenchRecord> {
    let bus = bench_bus(BusConfig::default().with_worker_threads(1))?;
    bus.register_handler(IntentType::BrainThink, move |intent| {
        thread::sleep(handler_time);
        Ok(IntentResult::success(intent.id(), None, Duration::ZERO))
    });

    let asked = Instant::now();
    let result = bus
        .request(Intent::new(IntentType::BrainThink), timeout)
        .wait();
    let waited = asked.elapsed();
    print!("{}", render::request_line(&result, waited));

    let deadline = deadline_after(handler_time, Duration::from_secs(10), "request")?;
    while bus.history(1).is_empty() {
        if Instant::now() >= deadline {
            bail!("handler never finished");
        }
        thread::sleep(Duration::from_millis(5));
    }
    let history_size = bus.metrics().history_size;
    println!(
        "handler finished after {}ms; history entries: {history_size}",
        asked.elapsed().as_millis()
    );
    let _ = bus.stop();
    Ok(render::BenchRecord {
        benchmark: "request",
        passed: history_size == 1,
        details: json!({
            "timeout_ms": timeout.as_millis() as u64,
            "handler_ms": handler_time.as_millis() as u64,
            "waited_ms": waited.as_millis() as u64,
            "timed_out": result.is_timeout(),
            "result": result,
        }),
    })
}

fn run_lifecycle(cycles: usize, publish: usize, workers: usize) -> Result<render::BenchRecord> {
    let config = BusConfig::default()
        .with_queue_capacity(publish.max(1))
        .with_worker_threads(workers)
        .with_shutdown_grace(Duration::from_secs(2));
    let bus = IntentBus::builder()
        .name("lifecycle-bus")
        .config(config)
        .sink(Arc::new(RecordingSink::new()))
        .build()
        .context("building bus")?;
    let ping = IntentType::Custom("PING".into());
    bus.register_handler(ping.clone(), |intent| {
        Ok(IntentResult::success(intent.id(), None, Duration::ZERO))
    });

    let mut rounds = Vec::with_capacity(cycles);
    for cycle in 0..cycles {
        bus.start()
            .with_context(|| format!("starting bus for cycle {cycle}"))?;
        let before = bus.metrics().processed;
        let accepted = (0..publish)
            .filter(|_| bus.publish(Intent::new(ping.clone())).is_accepted())
            .count();

        let deadline = deadline_after(Duration::from_secs(10), Duration::ZERO, "lifecycle")?;
        while bus.metrics().processed - before < accepted as u64 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        let processed = bus.metrics().processed - before;
        let shutdown = bus.stop();
        if !shutdown.all_joined() {
            warn!("cycle {cycle} left threads running: {shutdown:?}");
        }
        rounds.push(render::Cycle {
            cycle,
            accepted,
            processed,
            shutdown,
        });
    }

    print!("{}", render::lifecycle_summary(&rounds));
    let passed = rounds
        .iter()
        .all(|round| round.detached() == 0 && round.processed == round.accepted as u64);
    Ok(render::BenchRecord {
        benchmark: "lifecycle",
        passed,
        details: json!({ "cycles": rounds }),
    })
}
