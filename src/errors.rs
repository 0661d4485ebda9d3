// src/errors.rs

//! Crate-wide error type and helpers.
//!
//! User work returns `anyhow::Result<bool>`; everything the crate itself can
//! fail with is a [`RunwireError`], which converts into `anyhow::Error` via `?`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunwireError {
    /// Precondition or input problem, surfaced before a run starts.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A required external tool is not available.
    #[error("Missing dependency: {tool}{}", hint_suffix(.install_hint))]
    Dependency {
        tool: String,
        install_hint: Option<String>,
    },

    /// Raised by pipeline logic while a run is active.
    #[error("Execution failed: {message}")]
    Execution {
        message: String,
        step: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Invalid log offset {offset} (buffer length {len})")]
    InvalidOffset { offset: usize, len: usize },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RunwireError {
    pub fn execution(message: impl Into<String>) -> Self {
        RunwireError::Execution {
            message: message.into(),
            step: None,
            exit_code: None,
        }
    }

    /// True for faults that must never change `RunStatus`.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RunwireError::Validation(_) | RunwireError::InvalidOffset { .. }
        )
    }
}

fn hint_suffix(hint: &Option<String>) -> String {
    hint.as_ref().map(|h| format!(" ({h})")).unwrap_or_default()
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RunwireError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_message_includes_hint() {
        let err = RunwireError::Dependency {
            tool: "samtools".into(),
            install_hint: Some("conda install samtools".into()),
        };
        assert_eq!(
            err.to_string(),
            "Missing dependency: samtools (conda install samtools)"
        );

        let bare = RunwireError::Dependency {
            tool: "git".into(),
            install_hint: None,
        };
        assert_eq!(bare.to_string(), "Missing dependency: git");
    }

    #[test]
    fn validation_classification() {
        assert!(RunwireError::Validation("x".into()).is_validation());
        assert!(RunwireError::InvalidOffset { offset: 3, len: 2 }.is_validation());
        assert!(!RunwireError::execution("boom").is_validation());
    }
}
