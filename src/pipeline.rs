// src/pipeline.rs

//! Units of work a controller can run.
//!
//! [`Pipeline`] is the seam between the controller and user logic; tests and
//! embedders implement it directly, the CLI uses [`CommandPipeline`], which
//! runs the `[[step]]` commands of a config file in order.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{PipelineConfig, StepConfig};
use crate::engine::RunContext;
use crate::errors::RunwireError;
use crate::exec::{require_tool, CANCELLED_EXIT_CODE};

/// Future returned by [`Pipeline::run`]: `Ok(true)` means success,
/// `Ok(false)` means the run stopped because it was cancelled.
pub type WorkFuture = Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + 'static>>;

pub trait Pipeline: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Steps known before the run starts, in order.
    fn step_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn run(self: Arc<Self>, ctx: RunContext) -> WorkFuture;
}

/// Runs the steps of a [`PipelineConfig`] one after another.
#[derive(Debug, Clone)]
pub struct CommandPipeline {
    config: PipelineConfig,
}

impl CommandPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    async fn execute(self: Arc<Self>, ctx: RunContext) -> anyhow::Result<bool> {
        ctx.progress().declare(self.config.step_names());

        for step in &self.config.steps {
            if ctx.is_cancelled() {
                debug!(run_id = ctx.run_id(), step = %step.name, "cancelled before step");
                return Ok(false);
            }
            if !run_step(&ctx, step).await? {
                return Ok(false);
            }
        }

        info!(run_id = ctx.run_id(), pipeline = %self.config.pipeline.name, "all steps done");
        Ok(true)
    }
}

impl Pipeline for CommandPipeline {
    fn name(&self) -> &str {
        &self.config.pipeline.name
    }

    fn step_names(&self) -> Vec<String> {
        self.config.step_names()
    }

    fn run(self: Arc<Self>, ctx: RunContext) -> WorkFuture {
        Box::pin(self.execute(ctx))
    }
}

/// Returns `Ok(false)` if the step was cancelled.
async fn run_step(ctx: &RunContext, step: &StepConfig) -> anyhow::Result<bool> {
    let logger = ctx.logger();

    if !step.enabled {
        logger.info(&format!("Skipping {} (disabled)", step.name));
        ctx.progress().skip(&step.name, "disabled");
        return Ok(true);
    }

    logger.step(&step.name);
    let guard = ctx.progress().enter(&step.name);

    for tool in &step.requires {
        require_tool(tool, None)?;
    }

    let code = ctx.run_command(step.command_spec()).await;
    debug!(run_id = ctx.run_id(), step = %step.name, exit_code = code, "step command exited");

    match code {
        0 => {
            guard.complete();
            Ok(true)
        }
        CANCELLED_EXIT_CODE => {
            guard.fail("cancelled");
            Ok(false)
        }
        code if step.continue_on_error => {
            guard.fail(format!("exit code {code}"));
            logger.warning(&format!(
                "{} failed with exit code {code}; continuing",
                step.name
            ));
            Ok(true)
        }
        code => {
            guard.set_note(format!("exit code {code}"));
            Err(RunwireError::Execution {
                message: format!("step '{}' exited with code {code}", step.name),
                step: Some(step.name.clone()),
                exit_code: Some(code),
            }
            .into())
        }
    }
}
