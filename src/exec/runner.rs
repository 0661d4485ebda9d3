// src/exec/runner.rs

//! Supervised execution of a single external process.

use std::io::ErrorKind;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, timeout_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::log::{LogBuffer, PipelineLogger};

use super::command::CommandSpec;

/// Returned when the process was terminated because cancellation was
/// requested. Real exit codes are never negative: a signal death is reported
/// as `128 + signal`.
pub const CANCELLED_EXIT_CODE: i32 = -1;

/// Returned when the program could not be found.
pub const NOT_FOUND_EXIT_CODE: i32 = 127;

/// Returned for any other failure to start or wait for the process.
pub const SPAWN_FAILED_EXIT_CODE: i32 = 1;

/// Tuning knobs for [`CommandRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerOptions {
    /// How often the cancellation check is polled while the process runs.
    pub cancel_poll_interval: Duration,
    /// How long a terminated process gets between the graceful and the
    /// forceful signal.
    pub grace_period: Duration,
    /// Shell used for string commands; `None` means `sh` / `cmd`.
    pub shell: Option<String>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            cancel_poll_interval: Duration::from_millis(50),
            grace_period: Duration::from_secs(2),
            shell: None,
        }
    }
}

/// Spawns and supervises external processes on behalf of pipeline logic.
#[derive(Debug, Clone, Default)]
pub struct CommandRunner {
    options: RunnerOptions,
}

enum Outcome {
    Exited(std::io::Result<ExitStatus>),
    Cancelled,
}

impl CommandRunner {
    pub fn new(options: RunnerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Run `spec` to completion, streaming stdout and stderr into `buffer`
    /// line by line in arrival order.
    ///
    /// `cancel_check` is polled every `cancel_poll_interval`. On the first
    /// `true` the process group is terminated (SIGTERM, then SIGKILL after
    /// the grace period), a notice is appended, and
    /// [`CANCELLED_EXIT_CODE`] is returned.
    ///
    /// Never fails: a non-zero exit is returned as-is, and spawn errors are
    /// logged into `buffer` and mapped to [`NOT_FOUND_EXIT_CODE`] or
    /// [`SPAWN_FAILED_EXIT_CODE`].
    pub async fn run<C>(&self, spec: impl Into<CommandSpec>, buffer: &LogBuffer, cancel_check: C) -> i32
    where
        C: Fn() -> bool,
    {
        let spec = spec.into();
        let logger = PipelineLogger::new(buffer.clone());
        let shown = spec.display();
        logger.command(&shown);

        if cancel_check() {
            info!(cmd = %shown, "cancellation already requested; not spawning");
            logger.warning("Terminated by user.");
            return CANCELLED_EXIT_CODE;
        }

        info!(cmd = %shown, "starting process");

        let mut command = spec.to_command(self.options.shell.as_deref());
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => return spawn_failure(&spec, &logger, err),
        };

        let pid = child.id();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_line_reader(stdout, buffer.clone(), "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_line_reader(stderr, buffer.clone(), "stderr"));
        }

        let mut ticker = interval(self.options.cancel_poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Either the process exits on its own, or cancellation is observed.
        let outcome = loop {
            tokio::select! {
                status = child.wait() => break Outcome::Exited(status),
                _ = ticker.tick() => {
                    if cancel_check() {
                        break Outcome::Cancelled;
                    }
                }
            }
        };

        match outcome {
            Outcome::Exited(Ok(status)) => {
                drain_readers(readers, self.options.grace_period).await;
                let code = exit_code(status);
                info!(
                    cmd = %shown,
                    pid,
                    exit_code = code,
                    success = status.success(),
                    "process exited"
                );
                code
            }
            Outcome::Exited(Err(err)) => {
                warn!(cmd = %shown, pid, error = %err, "failed waiting for process");
                terminate(&mut child, pid, self.options.grace_period).await;
                drain_readers(readers, self.options.grace_period).await;
                logger.error(&format!("Failed to execute command: {err}"));
                SPAWN_FAILED_EXIT_CODE
            }
            Outcome::Cancelled => {
                info!(cmd = %shown, pid, "cancellation requested; terminating process");
                terminate(&mut child, pid, self.options.grace_period).await;
                drain_readers(readers, self.options.grace_period).await;
                logger.warning("Terminated by user.");
                CANCELLED_EXIT_CODE
            }
        }
    }
}

fn spawn_failure(spec: &CommandSpec, logger: &PipelineLogger, err: std::io::Error) -> i32 {
    let program = spec.program().unwrap_or_default();
    warn!(program, error = %err, "failed to spawn process");
    if err.kind() == ErrorKind::NotFound {
        logger.error(&format!("Command not found: {program}"));
        NOT_FOUND_EXIT_CODE
    } else {
        logger.error(&format!("Failed to execute command: {err}"));
        SPAWN_FAILED_EXIT_CODE
    }
}

/// Read `stream` line by line and append each line to `buffer` atomically.
/// Invalid UTF-8 is replaced rather than ending the stream.
fn spawn_line_reader<R>(stream: R, buffer: LogBuffer, name: &'static str) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut line = Vec::new();

        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&line);
                    buffer.append_line(text.trim_end_matches(['\n', '\r']));
                }
                Err(err) => {
                    debug!(stream = name, error = %err, "output stream read failed");
                    break;
                }
            }
        }

        debug!(stream = name, "output stream closed");
    })
}

/// Wait for the readers to hit EOF, sharing one deadline. Readers still open
/// afterwards (a detached grandchild holding the pipe) are aborted.
async fn drain_readers(readers: Vec<JoinHandle<()>>, limit: Duration) {
    let deadline = Instant::now() + limit;
    for mut reader in readers {
        if timeout_at(deadline, &mut reader).await.is_err() {
            debug!("output reader still open after process exit; aborting it");
            reader.abort();
        }
    }
}

/// Graceful signal to the process group, forceful one after `grace`.
///
/// `pid` is captured at spawn time: once the leader is reaped `Child::id`
/// returns `None`, but the pid still names the group.
async fn terminate(child: &mut Child, pid: Option<u32>, grace: Duration) {
    send_signal(child, pid, Signal::Terminate);

    match timeout(grace, child.wait()).await {
        Ok(_) => {
            // Sweep anything left in the group.
            send_signal(child, pid, Signal::Kill);
        }
        Err(_) => {
            warn!(
                pid,
                grace_ms = grace.as_millis() as u64,
                "process ignored graceful termination; killing"
            );
            send_signal(child, pid, Signal::Kill);
            if let Err(e) = child.kill().await {
                warn!(pid, error = %e, "failed to kill child process");
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Terminate,
    Kill,
}

#[cfg(unix)]
fn send_signal(_child: &mut Child, pid: Option<u32>, signal: Signal) {
    use nix::sys::signal::{killpg, Signal as UnixSignal};
    use nix::unistd::Pid;

    let Some(pid) = pid else {
        return;
    };
    let signal = match signal {
        Signal::Terminate => UnixSignal::SIGTERM,
        Signal::Kill => UnixSignal::SIGKILL,
    };
    // ESRCH just means the group is already gone.
    let _ = killpg(Pid::from_raw(pid as i32), signal);
}

#[cfg(not(unix))]
fn send_signal(child: &mut Child, _pid: Option<u32>, _signal: Signal) {
    let _ = child.start_kill();
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    SPAWN_FAILED_EXIT_CODE
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn never() -> bool {
        false
    }

    #[tokio::test]
    async fn returns_real_exit_codes() {
        let runner = CommandRunner::default();
        let buf = LogBuffer::new();
        assert_eq!(runner.run("exit 0", &buf, never).await, 0);
        assert_eq!(runner.run("exit 3", &buf, never).await, 3);
    }

    #[tokio::test]
    async fn captures_both_streams() {
        let runner = CommandRunner::default();
        let buf = LogBuffer::new();
        let code = runner
            .run("echo out; echo err 1>&2", &buf, never)
            .await;
        assert_eq!(code, 0);
        let text = buf.contents();
        assert!(text.contains("$ echo out; echo err 1>&2"));
        assert!(text.contains("out\n"));
        assert!(text.contains("err\n"));
    }

    #[tokio::test]
    async fn partial_last_line_is_terminated() {
        let runner = CommandRunner::default();
        let buf = LogBuffer::new();
        runner.run("printf 'no newline'", &buf, never).await;
        assert!(buf.contents().ends_with("no newline\n"));
    }

    #[tokio::test]
    async fn missing_program_maps_to_127() {
        let runner = CommandRunner::default();
        let buf = LogBuffer::new();
        let spec = CommandSpec::argv(["definitely-not-a-real-program-xyz"]);
        let code = runner.run(spec, &buf, never).await;
        assert_eq!(code, NOT_FOUND_EXIT_CODE);
        assert!(buf.contents().contains("Command not found: definitely-not-a-real-program-xyz"));
    }

    #[tokio::test]
    async fn pre_cancelled_never_spawns() {
        let runner = CommandRunner::default();
        let buf = LogBuffer::new();
        let code = runner.run("echo should-not-run", &buf, || true).await;
        assert_eq!(code, CANCELLED_EXIT_CODE);
        assert!(!buf.contents().lines().any(|l| l == "should-not-run"));
        assert!(buf.contents().contains("Terminated by user."));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn signal_death_is_not_the_sentinel() {
        let runner = CommandRunner::default();
        let buf = LogBuffer::new();
        let code = runner.run("kill -9 $$", &buf, never).await;
        assert_eq!(code, 128 + 9);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancellation_escalates_when_term_is_ignored() {
        let options = RunnerOptions {
            cancel_poll_interval: Duration::from_millis(10),
            grace_period: Duration::from_millis(300),
            shell: None,
        };
        let runner = CommandRunner::new(options);
        let buf = LogBuffer::new();
        let flag = Arc::new(AtomicBool::new(false));

        let canceller = {
            let flag = flag.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                flag.store(true, Ordering::SeqCst);
            })
        };

        let started = std::time::Instant::now();
        let code = runner
            .run(
                "trap '' TERM; echo ready; sleep 30",
                &buf,
                || flag.load(Ordering::SeqCst),
            )
            .await;
        canceller.await.unwrap();

        assert_eq!(code, CANCELLED_EXIT_CODE);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(buf.contents().contains("ready\n"));
    }
}
