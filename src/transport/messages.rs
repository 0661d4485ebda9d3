// src/transport/messages.rs

use serde::{Deserialize, Serialize};

use crate::progress::ProgressState;
use crate::types::{RunId, RunStatus};

/// Unsolicited delta: `content` starts at byte `offset` of the run's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogPush {
    pub run_id: RunId,
    pub offset: usize,
    pub content: String,
    pub status: RunStatus,
}

/// Answer to a poll: exactly the log past `offset` at the moment of the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollResponse {
    /// `None` before the first run.
    pub run_id: Option<RunId>,
    pub offset: usize,
    pub content: String,
    pub next_offset: usize,
    pub status: RunStatus,
}

/// Sent once per run, after it left `running`. `logs` is the whole log and
/// supersedes anything pushed before.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFinished {
    pub run_id: RunId,
    pub logs: String,
    pub status: RunStatus,
    pub status_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    LogPush(LogPush),
    PollResponse(PollResponse),
    RunFinished(RunFinished),
    Progress {
        run_id: RunId,
        progress: ProgressState,
    },
    Rejected {
        reason: String,
    },
}

impl OutboundMessage {
    pub fn run_id(&self) -> Option<RunId> {
        match self {
            OutboundMessage::LogPush(p) => Some(p.run_id),
            OutboundMessage::PollResponse(p) => p.run_id,
            OutboundMessage::RunFinished(f) => Some(f.run_id),
            OutboundMessage::Progress { run_id, .. } => Some(*run_id),
            OutboundMessage::Rejected { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    PollRequest {
        #[serde(default)]
        offset: usize,
    },
    CancelRequest,
    RunRequest,
}
