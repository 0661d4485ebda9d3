// src/types.rs

//! Small value types shared by the controller, transport and CLI.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Monotonic identifier of a run within one controller instance.
pub type RunId = u64;

/// Lifecycle status of the controller.
///
/// Exactly one value is current at any time. Only
/// [`ExecutionController`](crate::engine::ExecutionController) moves between
/// them; on the wire they travel as the lowercase names below and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Finished,
    Error,
    Aborted,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Finished => "finished",
            RunStatus::Error => "error",
            RunStatus::Aborted => "aborted",
        }
    }

    /// `finished`, `error` or `aborted`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Finished | RunStatus::Error | RunStatus::Aborted
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(RunStatus::Idle),
            "running" => Ok(RunStatus::Running),
            "finished" => Ok(RunStatus::Finished),
            "error" => Ok(RunStatus::Error),
            "aborted" => Ok(RunStatus::Aborted),
            other => Err(format!(
                "invalid run status: {other} (expected idle, running, finished, error or aborted)"
            )),
        }
    }
}

/// Why a run left `running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitReason {
    Normal,
    Exception,
    Aborted,
}

/// Produced exactly once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub success: bool,
    pub exit_reason: ExitReason,
    pub error_detail: Option<String>,
}

impl RunResult {
    pub fn finished() -> Self {
        Self {
            success: true,
            exit_reason: ExitReason::Normal,
            error_detail: None,
        }
    }

    pub fn aborted() -> Self {
        Self {
            success: false,
            exit_reason: ExitReason::Aborted,
            error_detail: None,
        }
    }

    pub fn exception(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_reason: ExitReason::Exception,
            error_detail: Some(detail.into()),
        }
    }

    /// Terminal status this result maps to.
    pub fn status(&self) -> RunStatus {
        match self.exit_reason {
            ExitReason::Normal => RunStatus::Finished,
            ExitReason::Exception => RunStatus::Error,
            ExitReason::Aborted => RunStatus::Aborted,
        }
    }

    /// Human status message shown next to the status.
    pub fn status_message(&self) -> String {
        match self.exit_reason {
            ExitReason::Normal => "Completed successfully".to_string(),
            ExitReason::Aborted => "Terminated by user".to_string(),
            ExitReason::Exception => match &self.error_detail {
                Some(detail) => {
                    let first = detail.lines().next().unwrap_or_default();
                    format!("Error: {first}")
                }
                None => "Failed".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_names() {
        for status in [
            RunStatus::Idle,
            RunStatus::Running,
            RunStatus::Finished,
            RunStatus::Error,
            RunStatus::Aborted,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(status.as_str().parse::<RunStatus>().unwrap(), status);
        }
        assert!("done".parse::<RunStatus>().is_err());
        assert!(serde_json::from_str::<RunStatus>("\"Running\"").is_err());
    }

    #[test]
    fn result_maps_to_terminal_status() {
        assert_eq!(RunResult::finished().status(), RunStatus::Finished);
        assert_eq!(RunResult::aborted().status(), RunStatus::Aborted);
        let err = RunResult::exception("boom\ncaused by: disk full");
        assert_eq!(err.status(), RunStatus::Error);
        assert_eq!(err.status_message(), "Error: boom");
        assert!(RunStatus::Aborted.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
    }
}
