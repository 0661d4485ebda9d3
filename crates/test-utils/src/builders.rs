#![allow(dead_code)]

use runwire::config::{PipelineConfig, RawConfigFile, StepConfig};

/// Builder for `PipelineConfig` to simplify test setup.
pub struct PipelineConfigBuilder {
    config: RawConfigFile,
}

impl PipelineConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.config.pipeline.name = name.to_string();
        self
    }

    pub fn with_step(mut self, step: StepConfig) -> Self {
        self.config.steps.push(step);
        self
    }

    pub fn grace_period(mut self, dur: &str) -> Self {
        self.config.runner.grace_period = dur.to_string();
        self
    }

    pub fn cancel_poll_interval(mut self, dur: &str) -> Self {
        self.config.runner.cancel_poll_interval = dur.to_string();
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> PipelineConfig {
        PipelineConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for PipelineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `StepConfig`.
pub struct StepConfigBuilder {
    step: StepConfig,
}

impl StepConfigBuilder {
    pub fn new(name: &str, cmd: &str) -> Self {
        Self {
            step: StepConfig::new(name, cmd),
        }
    }

    pub fn disabled(mut self) -> Self {
        self.step.enabled = false;
        self
    }

    pub fn continue_on_error(mut self) -> Self {
        self.step.continue_on_error = true;
        self
    }

    pub fn requires(mut self, tool: &str) -> Self {
        self.step.requires.push(tool.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.step.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> StepConfig {
        self.step
    }
}
