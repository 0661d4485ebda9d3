// src/transport/cursor.rs

//! Observer-side bookkeeping for push/poll delivery.

use crate::progress::ProgressState;
use crate::types::{RunId, RunStatus};

use super::messages::OutboundMessage;

/// What applying one message did to the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorUpdate {
    /// New bytes were accepted in order; render them.
    Appended(String),
    /// Nothing new: a duplicate, an empty delta, or a status/progress update.
    Unchanged,
    /// A push started past what was consumed. Poll from `from`.
    Gap { from: usize },
    /// The authoritative final log diverged from what was rendered; this is
    /// the full replacement.
    Replaced(String),
    /// The message was for an older run or arrived after `run_finished`.
    Ignored,
}

/// Tracks one observer's view of the current run's log.
///
/// The consumed offset lives here and only here. Pushes and polls may
/// overlap, arrive late, or be dropped; the cursor accepts exactly the bytes
/// it does not yet have and never skips any.
#[derive(Debug, Clone, Default)]
pub struct ObserverCursor {
    run_id: Option<RunId>,
    text: String,
    status: RunStatus,
    progress: Option<ProgressState>,
    status_message: Option<String>,
    finished: bool,
}

impl ObserverCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset to use for the next poll.
    pub fn consumed(&self) -> usize {
        self.text.len()
    }

    pub fn run_id(&self) -> Option<RunId> {
        self.run_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn progress(&self) -> Option<&ProgressState> {
        self.progress.as_ref()
    }

    /// Set once `run_finished` arrived.
    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    /// Whether `run_finished` was applied for the current run.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn apply(&mut self, msg: &OutboundMessage) -> CursorUpdate {
        match msg {
            OutboundMessage::LogPush(push) => {
                if !self.enter_run(push.run_id) {
                    return CursorUpdate::Ignored;
                }
                self.status = push.status;
                self.accept(push.offset, &push.content)
            }
            OutboundMessage::PollResponse(resp) => {
                let Some(run_id) = resp.run_id else {
                    if self.run_id.is_none() {
                        self.status = resp.status;
                    }
                    return CursorUpdate::Unchanged;
                };
                if !self.enter_run(run_id) {
                    return CursorUpdate::Ignored;
                }
                self.status = resp.status;
                self.accept(resp.offset, &resp.content)
            }
            OutboundMessage::RunFinished(fin) => {
                if !self.enter_run(fin.run_id) {
                    return CursorUpdate::Ignored;
                }
                self.finished = true;
                self.status = fin.status;
                self.status_message = Some(fin.status_message.clone());

                let update = match fin.logs.strip_prefix(self.text.as_str()) {
                    Some("") => CursorUpdate::Unchanged,
                    Some(rest) => CursorUpdate::Appended(rest.to_string()),
                    None => CursorUpdate::Replaced(fin.logs.clone()),
                };
                self.text.clone_from(&fin.logs);
                update
            }
            OutboundMessage::Progress { run_id, progress } => {
                if !self.enter_run(*run_id) {
                    return CursorUpdate::Ignored;
                }
                self.progress = Some(progress.clone());
                CursorUpdate::Unchanged
            }
            OutboundMessage::Rejected { .. } => CursorUpdate::Unchanged,
        }
    }

    /// Switch to `run_id` if it is newer. Returns `false` if messages for
    /// `run_id` should be dropped.
    fn enter_run(&mut self, run_id: RunId) -> bool {
        match self.run_id {
            Some(current) if run_id < current => false,
            Some(current) if run_id == current => !self.finished,
            _ => {
                *self = Self {
                    run_id: Some(run_id),
                    ..Self::default()
                };
                true
            }
        }
    }

    fn accept(&mut self, offset: usize, content: &str) -> CursorUpdate {
        let consumed = self.consumed();
        let end = offset + content.len();

        if offset > consumed {
            // Bytes between `consumed` and `offset` were never delivered.
            return CursorUpdate::Gap { from: consumed };
        }
        if end <= consumed {
            return CursorUpdate::Unchanged;
        }
        match content.get(consumed - offset..) {
            Some(fresh) => {
                self.text.push_str(fresh);
                CursorUpdate::Appended(fresh.to_string())
            }
            None => CursorUpdate::Gap { from: consumed },
        }
    }
}
