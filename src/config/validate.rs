// src/config/validate.rs

use std::collections::HashSet;
use std::time::Duration;

use crate::config::duration::parse_duration;
use crate::config::model::{PipelineConfig, RawConfigFile, RawRunnerSection};
use crate::errors::{Result, RunwireError};
use crate::exec::RunnerOptions;

impl TryFrom<RawConfigFile> for PipelineConfig {
    type Error = RunwireError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let runner = runner_options(&raw.runner)?;
        Ok(PipelineConfig::new_unchecked(raw.pipeline, runner, raw.steps))
    }
}

/// Check everything a run would otherwise trip over halfway through.
pub fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_steps(cfg)?;
    validate_steps(cfg)?;
    runner_options(&cfg.runner)?;
    Ok(())
}

fn ensure_has_steps(cfg: &RawConfigFile) -> Result<()> {
    if cfg.steps.is_empty() {
        return Err(RunwireError::Validation(
            "config must contain at least one [[step]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_steps(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();
    for (idx, step) in cfg.steps.iter().enumerate() {
        if step.name.trim().is_empty() {
            return Err(RunwireError::Validation(format!(
                "step #{} has an empty name",
                idx + 1
            )));
        }
        if !seen.insert(step.name.as_str()) {
            return Err(RunwireError::Validation(format!(
                "duplicate step name '{}'",
                step.name
            )));
        }
        if step.cmd.trim().is_empty() {
            return Err(RunwireError::Validation(format!(
                "step '{}' has an empty `cmd`",
                step.name
            )));
        }
        if let Some(tool) = step.requires.iter().find(|t| t.trim().is_empty()) {
            return Err(RunwireError::Validation(format!(
                "step '{}' lists an empty tool name in `requires` ({tool:?})",
                step.name
            )));
        }
    }
    Ok(())
}

fn runner_options(raw: &RawRunnerSection) -> Result<RunnerOptions> {
    let cancel_poll_interval = non_zero("cancel_poll_interval", &raw.cancel_poll_interval)?;
    let grace_period = non_zero("grace_period", &raw.grace_period)?;

    if let Some(shell) = &raw.shell {
        if shell.trim().is_empty() {
            return Err(RunwireError::Validation(
                "[runner].shell must not be empty".to_string(),
            ));
        }
    }

    Ok(RunnerOptions {
        cancel_poll_interval,
        grace_period,
        shell: raw.shell.clone(),
    })
}

fn non_zero(field: &str, value: &str) -> Result<Duration> {
    let dur = parse_duration(value).map_err(|e| match e {
        RunwireError::Validation(msg) => RunwireError::Validation(format!("[runner].{field}: {msg}")),
        other => other,
    })?;
    if dur.is_zero() {
        return Err(RunwireError::Validation(format!(
            "[runner].{field} must be greater than zero"
        )));
    }
    Ok(dur)
}
