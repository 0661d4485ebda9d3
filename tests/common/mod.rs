#![allow(dead_code)]

pub use runwire_test_utils::builders;
pub use runwire_test_utils::{init_tracing, wait_for_log, with_timeout};

use std::time::Duration;

use runwire::exec::RunnerOptions;

/// Runner options with a short grace period so cancellation tests stay fast.
pub fn fast_runner() -> RunnerOptions {
    RunnerOptions {
        cancel_poll_interval: Duration::from_millis(20),
        grace_period: Duration::from_millis(500),
        shell: None,
    }
}

/// Poll `cond` every few milliseconds until it holds. Pair with `with_timeout`.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    while !cond() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Whether `log` has a line exactly equal to `line`, i.e. process output
/// rather than the echoed command.
pub fn has_line(log: &str, line: &str) -> bool {
    log.lines().any(|l| l == line)
}
