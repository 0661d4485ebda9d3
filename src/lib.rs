// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod log;
pub mod logging;
pub mod pipeline;
pub mod progress;
pub mod transport;
pub mod types;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{load_and_validate, PipelineConfig};
use crate::engine::ExecutionController;
use crate::pipeline::{CommandPipeline, Pipeline};
use crate::transport::{
    ChannelSink, CursorUpdate, InboundMessage, ObserverCursor, ObserverSink, OutboundMessage,
    Transport,
};
use crate::types::RunStatus;

/// Process exit code for an aborted run, as for SIGINT.
pub const ABORTED_EXIT_CODE: i32 = 130;

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// This wires together:
/// - config loading
/// - controller + command pipeline
/// - transport with an in-process observer printing to stdout
/// - Ctrl-C handling (sent as `cancel_request`)
pub async fn run(args: CliArgs) -> Result<i32> {
    let cfg = load_and_validate(&args.config)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(0);
    }

    let controller = ExecutionController::new(cfg.runner.clone());
    let pipeline: Arc<dyn Pipeline> = Arc::new(CommandPipeline::new(cfg));
    info!(pipeline = %pipeline.name(), steps = ?pipeline.step_names(), "starting pipeline");

    let (sink, mut rx) = ChannelSink::new();
    let transport = Transport::new(controller, sink).with_pipeline(pipeline);
    let pump = transport.spawn_pump();

    // Ctrl-C → cancel_request.
    {
        let transport = transport.clone();
        tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "failed to listen for Ctrl+C");
                    return;
                }
                if let Err(e) = transport.handle(InboundMessage::CancelRequest) {
                    warn!(error = %e, "cancel_request failed");
                }
            }
        });
    }

    transport.handle(InboundMessage::RunRequest)?;
    let status = observe(&transport, &mut rx, args.poll_interval).await;
    pump.abort();

    let status = status?;
    Ok(exit_code_for(status))
}

pub fn exit_code_for(status: RunStatus) -> i32 {
    match status {
        RunStatus::Finished => 0,
        RunStatus::Aborted => ABORTED_EXIT_CODE,
        _ => 1,
    }
}

/// Render reconciled output until `run_finished` arrives.
async fn observe<S: ObserverSink>(
    transport: &Transport<S>,
    rx: &mut mpsc::UnboundedReceiver<OutboundMessage>,
    poll_every: Duration,
) -> Result<RunStatus> {
    let mut cursor = ObserverCursor::new();
    let mut ticker = tokio::time::interval(poll_every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut out = std::io::stdout();

    loop {
        tokio::select! {
            msg = rx.recv() => {
                let msg = msg.ok_or_else(|| anyhow!("observer channel closed before the run finished"))?;
                if let OutboundMessage::Rejected { reason } = &msg {
                    warn!(%reason, "request rejected");
                }

                match cursor.apply(&msg) {
                    CursorUpdate::Appended(text) => {
                        out.write_all(text.as_bytes())?;
                        out.flush()?;
                    }
                    CursorUpdate::Replaced(text) => {
                        debug!("final log diverged from streamed output; reprinting");
                        writeln!(out)?;
                        out.write_all(text.as_bytes())?;
                        out.flush()?;
                    }
                    CursorUpdate::Gap { from } => {
                        transport.handle(InboundMessage::PollRequest { offset: from })?;
                    }
                    CursorUpdate::Unchanged | CursorUpdate::Ignored => {}
                }

                if cursor.is_finished() {
                    let status = cursor.status();
                    info!(%status, status_message = cursor.status_message().unwrap_or_default(), "run finished");
                    return Ok(status);
                }
            }
            _ = ticker.tick() => {
                transport.handle(InboundMessage::PollRequest { offset: cursor.consumed() })?;
            }
        }
    }
}

/// Simple dry-run output: print pipeline settings and steps.
fn print_dry_run(cfg: &PipelineConfig) {
    println!("runwire dry-run");
    println!("  pipeline.name = {}", cfg.pipeline.name);
    println!("  pipeline.title = {}", cfg.pipeline.title);
    if !cfg.pipeline.subtitle.is_empty() {
        println!("  pipeline.subtitle = {}", cfg.pipeline.subtitle);
    }
    println!("  runner.cancel_poll_interval = {:?}", cfg.runner.cancel_poll_interval);
    println!("  runner.grace_period = {:?}", cfg.runner.grace_period);
    if let Some(ref shell) = cfg.runner.shell {
        println!("  runner.shell = {shell}");
    }
    println!();

    println!("steps ({}):", cfg.steps.len());
    for step in &cfg.steps {
        println!("  - {}", step.name);
        println!("      cmd: {}", step.cmd);
        if !step.enabled {
            println!("      enabled: false");
        }
        if let Some(ref cwd) = step.cwd {
            println!("      cwd: {}", cwd.display());
        }
        if step.continue_on_error {
            println!("      continue_on_error: true");
        }
        if !step.requires.is_empty() {
            println!("      requires: {:?}", step.requires);
        }
        if !step.env.is_empty() {
            println!("      env: {:?}", step.env);
        }
    }

    debug!("dry-run complete (no execution)");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_status() {
        assert_eq!(exit_code_for(RunStatus::Finished), 0);
        assert_eq!(exit_code_for(RunStatus::Error), 1);
        assert_eq!(exit_code_for(RunStatus::Aborted), 130);
    }
}
