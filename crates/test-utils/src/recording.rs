use std::sync::{Arc, Mutex};

use runwire::errors::Result;
use runwire::transport::{ObserverSink, OutboundMessage, RunFinished};

/// Sink that keeps every outbound message for later assertions.
///
/// Clones share the same record, so a test can hand one clone to a
/// `Transport` and inspect through another.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    messages: Arc<Mutex<Vec<OutboundMessage>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.messages.lock().unwrap().clear();
    }

    /// All `run_finished` messages, in order.
    pub fn finished(&self) -> Vec<RunFinished> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                OutboundMessage::RunFinished(f) => Some(f),
                _ => None,
            })
            .collect()
    }
}

impl ObserverSink for RecordingSink {
    fn send(&self, msg: OutboundMessage) -> Result<()> {
        self.messages.lock().unwrap().push(msg);
        Ok(())
    }
}
