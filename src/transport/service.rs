// src/transport/service.rs

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::{ExecutionController, RunEvent};
use crate::errors::{Result, RunwireError};
use crate::log::LogChunk;
use crate::pipeline::Pipeline;
use crate::progress::ProgressState;
use crate::types::{RunId, RunStatus};

use super::messages::{InboundMessage, LogPush, OutboundMessage, PollResponse, RunFinished};
use super::sink::ObserverSink;

/// Serves one controller to one observer.
///
/// Stateless per request: a poll reads the current log length and nothing
/// else, so any interleaving of pushes and polls yields exactly
/// `LogBuffer::slice(offset)`.
pub struct Transport<S: ObserverSink> {
    controller: ExecutionController,
    sink: Arc<S>,
    pipeline: Option<Arc<dyn Pipeline>>,
}

impl<S: ObserverSink> Clone for Transport<S> {
    fn clone(&self) -> Self {
        Self {
            controller: self.controller.clone(),
            sink: self.sink.clone(),
            pipeline: self.pipeline.clone(),
        }
    }
}

impl<S: ObserverSink> Transport<S> {
    pub fn new(controller: ExecutionController, sink: S) -> Self {
        Self {
            controller,
            sink: Arc::new(sink),
            pipeline: None,
        }
    }

    /// Pipeline started by `run_request`.
    pub fn with_pipeline(mut self, pipeline: Arc<dyn Pipeline>) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn controller(&self) -> &ExecutionController {
        &self.controller
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Send a delta that starts at `offset`, tagged with the current status.
    pub fn push(&self, run_id: RunId, offset: usize, content: String) -> Result<()> {
        self.sink.send(OutboundMessage::LogPush(LogPush {
            run_id,
            offset,
            content,
            status: self.controller.status(),
        }))
    }

    /// Everything past `offset` in the current run's log.
    pub fn poll(&self, offset: usize) -> Result<PollResponse> {
        // Status first: if it is already terminal, the slice below is final.
        let status = self.controller.status();
        let Some(run) = self.controller.current_run() else {
            return Ok(PollResponse {
                run_id: None,
                offset,
                content: String::new(),
                next_offset: offset,
                status,
            });
        };

        let content = run.log.slice(offset)?;
        let next_offset = offset + content.len();
        debug!(run_id = run.run_id, offset, next_offset, "poll served");
        Ok(PollResponse {
            run_id: Some(run.run_id),
            offset,
            content,
            next_offset,
            status,
        })
    }

    /// Send the authoritative final log of a run.
    pub fn finalize(&self, run_id: RunId, logs: String, status: RunStatus) -> Result<()> {
        let status_message = match self.controller.last_result() {
            Some(result) if result.status() == status => result.status_message(),
            _ => String::new(),
        };
        info!(run_id, %status, len = logs.len(), "run finalized to observer");
        self.sink.send(OutboundMessage::RunFinished(RunFinished {
            run_id,
            logs,
            status,
            status_message,
        }))
    }

    pub fn push_progress(&self, run_id: RunId, progress: ProgressState) -> Result<()> {
        self.sink
            .send(OutboundMessage::Progress { run_id, progress })
    }

    /// Act on one observer request. Replies, if any, go to the sink.
    pub fn handle(&self, msg: InboundMessage) -> Result<()> {
        match msg {
            InboundMessage::PollRequest { offset } => match self.poll(offset) {
                Ok(resp) => self.sink.send(OutboundMessage::PollResponse(resp)),
                Err(e @ RunwireError::InvalidOffset { .. }) => {
                    warn!(offset, error = %e, "rejecting poll");
                    self.reject(e.to_string())
                }
                Err(e) => Err(e),
            },
            InboundMessage::CancelRequest => {
                if !self.controller.request_cancel() {
                    debug!("cancel_request with no active run");
                }
                Ok(())
            }
            InboundMessage::RunRequest => {
                let Some(pipeline) = self.pipeline.clone() else {
                    return self.reject("no pipeline configured".to_string());
                };
                if self.controller.start_pipeline(pipeline) {
                    Ok(())
                } else {
                    self.reject("a run is already active".to_string())
                }
            }
        }
    }

    fn reject(&self, reason: String) -> Result<()> {
        self.sink.send(OutboundMessage::Rejected { reason })
    }

    /// Forward log chunks, progress and run completion to the sink until the
    /// sink fails.
    ///
    /// Spawn this before starting runs: a run whose `Started` event predates
    /// the pump is only reached through polling and its `run_finished`.
    /// Chunks appended before the pump attaches to a run are not pushed
    /// either; the observer sees the gap and polls.
    pub fn spawn_pump(&self) -> JoinHandle<()> {
        let events = self.controller.subscribe_events();
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.pump(events).await {
                warn!(error = %e, "observer pump stopped");
            }
        })
    }

    async fn pump(&self, mut events: broadcast::Receiver<RunEvent>) -> Result<()> {
        let mut chunks: Option<(RunId, broadcast::Receiver<LogChunk>)> = None;
        let mut progress: Option<(RunId, watch::Receiver<ProgressState>)> = None;

        loop {
            tokio::select! {
                biased;

                event = events.recv() => match event {
                    Ok(RunEvent::Started { run_id, log, progress: tracker }) => {
                        debug!(run_id, "pump attached to run");
                        chunks = Some((run_id, log.subscribe()));
                        progress = Some((run_id, tracker.subscribe()));
                        self.push_progress(run_id, tracker.snapshot())?;
                    }
                    Ok(RunEvent::Finished { run_id, status, log, .. }) => {
                        chunks = None;
                        progress = None;
                        self.finalize(run_id, log.contents(), status)?;
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!(missed = n, "pump lagged behind run events");
                    }
                    Err(RecvError::Closed) => return Ok(()),
                },

                (run_id, chunk) = next_chunk(&mut chunks) => match chunk {
                    Ok(chunk) => self.push(run_id, chunk.offset, chunk.content)?,
                    Err(RecvError::Lagged(n)) => {
                        debug!(run_id, missed = n, "push lagged; observer will poll");
                    }
                    Err(RecvError::Closed) => chunks = None,
                },

                (run_id, changed) = next_progress(&mut progress) => match changed {
                    Some(state) => self.push_progress(run_id, state)?,
                    None => progress = None,
                },
            }
        }
    }
}

async fn next_chunk(
    slot: &mut Option<(RunId, broadcast::Receiver<LogChunk>)>,
) -> (RunId, std::result::Result<LogChunk, RecvError>) {
    match slot {
        Some((run_id, rx)) => (*run_id, rx.recv().await),
        None => std::future::pending().await,
    }
}

async fn next_progress(
    slot: &mut Option<(RunId, watch::Receiver<ProgressState>)>,
) -> (RunId, Option<ProgressState>) {
    match slot {
        Some((run_id, rx)) => match rx.changed().await {
            Ok(()) => (*run_id, Some(rx.borrow_and_update().clone())),
            Err(_) => (*run_id, None),
        },
        None => std::future::pending().await,
    }
}
