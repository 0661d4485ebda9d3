// src/engine/context.rs

use crate::exec::{CommandRunner, CommandSpec};
use crate::log::{LogBuffer, PipelineLogger};
use crate::progress::ProgressTracker;
use crate::types::RunId;

use super::cancel::CancelFlag;

/// Everything a run's work receives: the live log, the progress tracker,
/// the cancellation flag, and a command runner bound to both.
#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: RunId,
    log: LogBuffer,
    logger: PipelineLogger,
    progress: ProgressTracker,
    cancel: CancelFlag,
    runner: CommandRunner,
}

impl RunContext {
    pub fn new(
        run_id: RunId,
        log: LogBuffer,
        progress: ProgressTracker,
        cancel: CancelFlag,
        runner: CommandRunner,
    ) -> Self {
        let logger = PipelineLogger::new(log.clone());
        Self {
            run_id,
            log,
            logger,
            progress,
            cancel,
            runner,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn log(&self) -> &LogBuffer {
        &self.log
    }

    pub fn logger(&self) -> &PipelineLogger {
        &self.logger
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Whether the observer asked this run to stop.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run an external command into this run's log, honouring cancellation.
    /// See [`CommandRunner::run`] for the exit-code contract.
    pub async fn run_command(&self, spec: impl Into<CommandSpec>) -> i32 {
        self.runner
            .run(spec, &self.log, self.cancel.checker())
            .await
    }
}
