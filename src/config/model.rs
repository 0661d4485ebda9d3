// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::exec::{CommandSpec, RunnerOptions};

/// Configuration exactly as read from TOML, before validation.
///
/// ```toml
/// [pipeline]
/// name = "build"
///
/// [runner]
/// grace_period = "2s"
///
/// [[step]]
/// name = "Setup"
/// cmd = "echo setting up"
/// ```
///
/// Every section is optional; a file without `[[step]]` entries parses but
/// fails validation.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub pipeline: PipelineSection,

    #[serde(default)]
    pub runner: RawRunnerSection,

    /// `[[step]]` entries, in execution order.
    #[serde(default, rename = "step")]
    pub steps: Vec<StepConfig>,
}

/// `[pipeline]` section: naming shown to the observer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PipelineSection {
    #[serde(default = "default_pipeline_name")]
    pub name: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
}

fn default_pipeline_name() -> String {
    "pipeline".to_string()
}

fn default_title() -> String {
    "Pipeline Launcher".to_string()
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            name: default_pipeline_name(),
            title: default_title(),
            subtitle: String::new(),
        }
    }
}

/// `[runner]` section. Durations stay strings until validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRunnerSection {
    #[serde(default = "default_cancel_poll_interval")]
    pub cancel_poll_interval: String,

    #[serde(default = "default_grace_period")]
    pub grace_period: String,

    /// Shell used for `cmd` strings. Defaults to `sh` (`cmd` on Windows).
    #[serde(default)]
    pub shell: Option<String>,
}

fn default_cancel_poll_interval() -> String {
    "50ms".to_string()
}

fn default_grace_period() -> String {
    "2s".to_string()
}

impl Default for RawRunnerSection {
    fn default() -> Self {
        Self {
            cancel_poll_interval: default_cancel_poll_interval(),
            grace_period: default_grace_period(),
            shell: None,
        }
    }
}

/// One `[[step]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StepConfig {
    pub name: String,

    /// Shell command line.
    pub cmd: String,

    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// Disabled steps are reported as skipped.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Keep going after a non-zero exit; the step is still marked failed.
    #[serde(default)]
    pub continue_on_error: bool,

    /// Programs that must be on `PATH` before the step runs.
    #[serde(default)]
    pub requires: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_enabled() -> bool {
    true
}

impl StepConfig {
    pub fn new(name: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cmd: cmd.into(),
            cwd: None,
            enabled: true,
            continue_on_error: false,
            requires: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    pub fn command_spec(&self) -> CommandSpec {
        let mut spec = CommandSpec::shell(self.cmd.clone());
        if let Some(cwd) = &self.cwd {
            spec = spec.cwd(cwd.clone());
        }
        for (key, value) in &self.env {
            spec = spec.env(key.clone(), value.clone());
        }
        spec
    }
}

/// Validated configuration. Build it with `PipelineConfig::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub pipeline: PipelineSection,
    pub runner: RunnerOptions,
    pub steps: Vec<StepConfig>,
}

impl PipelineConfig {
    /// Used by `TryFrom<RawConfigFile>` once all checks passed.
    pub(crate) fn new_unchecked(
        pipeline: PipelineSection,
        runner: RunnerOptions,
        steps: Vec<StepConfig>,
    ) -> Self {
        Self {
            pipeline,
            runner,
            steps,
        }
    }

    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name.clone()).collect()
    }
}
