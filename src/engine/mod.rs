// src/engine/mod.rs

//! Run lifecycle for runwire.
//!
//! This module ties together:
//! - the [`ExecutionController`], which owns the status state machine and
//!   launches user work on a background task
//! - the per-run [`RunContext`] handed to that work (log, progress,
//!   cancellation, command runner)
//! - [`RunEvent`]s that announce run start/finish to the transport layer
//!
//! Cancellation has two forms: the [`CancelFlag`] user logic checks on its
//! own schedule, and the process kill that
//! [`CommandRunner`](crate::exec::CommandRunner) performs when it observes
//! that flag.

use crate::log::LogBuffer;
use crate::progress::ProgressTracker;
use crate::types::{RunId, RunResult, RunStatus};

/// Lifecycle announcements, broadcast in transition order.
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// A run was accepted; `log` and `progress` are its fresh instances.
    Started {
        run_id: RunId,
        log: LogBuffer,
        progress: ProgressTracker,
    },
    /// The run left `running`. Emitted exactly once per run, after the
    /// final log lines were written.
    Finished {
        run_id: RunId,
        status: RunStatus,
        result: RunResult,
        log: LogBuffer,
    },
}

pub mod cancel;
pub mod context;
pub mod controller;

pub use cancel::CancelFlag;
pub use context::RunContext;
pub use controller::{ExecutionController, RunHandle};
