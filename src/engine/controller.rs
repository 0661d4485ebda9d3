// src/engine/controller.rs

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use crate::exec::{CommandRunner, RunnerOptions};
use crate::log::{LogBuffer, PipelineLogger};
use crate::pipeline::Pipeline;
use crate::progress::ProgressTracker;
use crate::types::{ExitReason, RunId, RunResult, RunStatus};

use super::cancel::CancelFlag;
use super::context::RunContext;
use super::RunEvent;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Owns the run lifecycle for one pipeline instance.
///
/// ```text
/// idle -> running -> { finished | error | aborted } -> running (next start) ...
/// ```
///
/// At most one run is active. Work executes on a background Tokio task; a
/// fault inside it (an `Err` or a panic) is caught at the task boundary,
/// written to the run's log, and turned into `error`. Nothing a run does
/// can take the host process down.
///
/// Clones are handles to the same controller.
#[derive(Clone)]
pub struct ExecutionController {
    shared: Arc<Shared>,
}

struct Shared {
    status: watch::Sender<RunStatus>,
    /// Serialises every status transition.
    current: Mutex<Option<RunSlot>>,
    events: broadcast::Sender<RunEvent>,
    last_run_id: AtomicU64,
    runner: CommandRunner,
}

struct RunSlot {
    handle: RunHandle,
    cancel: CancelFlag,
    result: Option<RunResult>,
}

/// The current (or most recent) run's shared state.
#[derive(Debug, Clone)]
pub struct RunHandle {
    pub run_id: RunId,
    pub log: LogBuffer,
    pub progress: ProgressTracker,
}

impl ExecutionController {
    pub fn new(options: RunnerOptions) -> Self {
        let (status, _) = watch::channel(RunStatus::Idle);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                status,
                current: Mutex::new(None),
                events,
                last_run_id: AtomicU64::new(0),
                runner: CommandRunner::new(options),
            }),
        }
    }

    /// Start a run of `work`. Returns `false`, changing nothing, if a run is
    /// already active or no Tokio runtime is available.
    ///
    /// `work` gets a fresh [`RunContext`]; returning `Ok(true)` ends the run
    /// as `finished`, `Ok(false)` as `aborted`, and `Err` as `error`.
    pub fn start<W, Fut>(&self, work: W) -> bool
    where
        W: FnOnce(RunContext) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "start called outside a Tokio runtime; rejecting");
                return false;
            }
        };

        let ctx = {
            let mut slot = self.shared.lock_current();
            if *self.shared.status.borrow() == RunStatus::Running {
                debug!("start rejected: a run is already active");
                return false;
            }

            let run_id = self.shared.last_run_id.fetch_add(1, Ordering::SeqCst) + 1;
            let handle = RunHandle {
                run_id,
                log: LogBuffer::new(),
                progress: ProgressTracker::new(),
            };
            let cancel = CancelFlag::new();

            *slot = Some(RunSlot {
                handle: handle.clone(),
                cancel: cancel.clone(),
                result: None,
            });
            self.shared.status.send_replace(RunStatus::Running);
            let _ = self.shared.events.send(RunEvent::Started {
                run_id,
                log: handle.log.clone(),
                progress: handle.progress.clone(),
            });

            RunContext::new(
                run_id,
                handle.log,
                handle.progress,
                cancel,
                self.shared.runner.clone(),
            )
        };

        info!(run_id = ctx.run_id(), "run started");
        runtime.spawn(supervise(self.shared.clone(), ctx, work));
        true
    }

    /// Start a run of `pipeline`.
    pub fn start_pipeline(&self, pipeline: Arc<dyn Pipeline>) -> bool {
        self.start(move |ctx| pipeline.run(ctx))
    }

    /// Ask the active run to stop. Returns `false` if nothing is running.
    ///
    /// User logic sees this through [`RunContext::is_cancelled`]; a
    /// subprocess started through the context is terminated by the runner.
    pub fn request_cancel(&self) -> bool {
        let slot = self.shared.lock_current();
        if *self.shared.status.borrow() != RunStatus::Running {
            debug!("cancel ignored: no active run");
            return false;
        }
        let Some(run) = slot.as_ref() else {
            return false;
        };

        if run.cancel.cancel() {
            info!(run_id = run.handle.run_id, "cancellation requested");
            PipelineLogger::new(run.handle.log.clone()).step("Terminating pipeline...");
        }
        true
    }

    pub fn status(&self) -> RunStatus {
        *self.shared.status.borrow()
    }

    /// Whether cancellation was requested for the current run.
    pub fn is_cancelled(&self) -> bool {
        self.shared
            .lock_current()
            .as_ref()
            .is_some_and(|run| run.cancel.is_cancelled())
    }

    /// Human text accompanying [`status`](Self::status).
    pub fn status_message(&self) -> String {
        match self.status() {
            RunStatus::Idle => String::new(),
            RunStatus::Running => "Pipeline running...".to_string(),
            _ => self
                .last_result()
                .map(|r| r.status_message())
                .unwrap_or_default(),
        }
    }

    /// The current run, or the most recent one once it ended.
    pub fn current_run(&self) -> Option<RunHandle> {
        self.shared
            .lock_current()
            .as_ref()
            .map(|run| run.handle.clone())
    }

    pub fn last_result(&self) -> Option<RunResult> {
        self.shared
            .lock_current()
            .as_ref()
            .and_then(|run| run.result.clone())
    }

    pub fn subscribe_status(&self) -> watch::Receiver<RunStatus> {
        self.shared.status.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<RunEvent> {
        self.shared.events.subscribe()
    }

    /// Resolve once no run is active, returning the status at that point.
    pub async fn wait_until_settled(&self) -> RunStatus {
        let mut rx = self.shared.status.subscribe();
        match rx.wait_for(|status| *status != RunStatus::Running).await {
            Ok(status) => *status,
            Err(_) => self.status(),
        }
    }
}

impl Default for ExecutionController {
    fn default() -> Self {
        Self::new(RunnerOptions::default())
    }
}

impl fmt::Debug for ExecutionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionController")
            .field("status", &self.status())
            .field("run_id", &self.shared.last_run_id.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn lock_current(&self) -> MutexGuard<'_, Option<RunSlot>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The single exit path out of `running`.
    fn finish(&self, run_id: RunId, result: RunResult, log: LogBuffer) {
        let status = result.status();
        let mut slot = self.lock_current();

        match slot.as_mut() {
            Some(run) if run.handle.run_id == run_id => run.result = Some(result.clone()),
            _ => warn!(run_id, "finished run is no longer the current one"),
        }

        self.status.send_replace(status);
        let _ = self.events.send(RunEvent::Finished {
            run_id,
            status,
            result,
            log,
        });

        info!(run_id, %status, "run finished");
    }
}

/// Drive `work` to completion and convert whatever happens into a
/// [`RunResult`].
async fn supervise<W, Fut>(shared: Arc<Shared>, ctx: RunContext, work: W)
where
    W: FnOnce(RunContext) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
{
    let run_id = ctx.run_id();
    let logger = ctx.logger().clone();
    let log = ctx.log().clone();

    logger.stage("Starting Pipeline");

    // Inner task so a panic surfaces as a JoinError instead of unwinding here.
    let task = tokio::spawn(async move { work(ctx).await });

    let result = match task.await {
        Ok(Ok(true)) => RunResult::finished(),
        Ok(Ok(false)) => RunResult::aborted(),
        Ok(Err(err)) => RunResult::exception(format!("{err:?}")),
        Err(join_err) if join_err.is_panic() => {
            RunResult::exception(format!("panic: {}", panic_message(join_err.into_panic())))
        }
        Err(join_err) => RunResult::exception(format!("run task cancelled: {join_err}")),
    };

    match result.exit_reason {
        ExitReason::Normal => logger.success("Completed successfully!"),
        ExitReason::Aborted => logger.warning("Pipeline was terminated."),
        ExitReason::Exception => {
            let detail = result.error_detail.as_deref().unwrap_or_default();
            error!(run_id, error = %detail, "run failed");
            logger.error(&format!("Critical exception: {detail}"));
        }
    }

    shared.finish(run_id, result, log);
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
