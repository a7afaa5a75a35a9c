//! End-to-end tests spanning the bus, the kernel, and the schedulers.

#[cfg(test)]
mod kernel_over_bus;

#[cfg(test)]
mod pipeline;

#[cfg(test)]
pub(crate) mod support {
    use std::thread;
    use std::time::{Duration, Instant};

    pub const WAIT: Duration = Duration::from_secs(5);

    pub fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// Polls `done` until it holds or [`WAIT`] passes.
    pub fn wait_until(mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        done()
    }
}
