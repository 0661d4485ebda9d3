// src/transport/sink.rs

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use anyhow::anyhow;
use tokio::sync::mpsc;

use crate::errors::Result;

use super::messages::OutboundMessage;

/// Destination for messages to the observer.
///
/// Implementations must not block for long: `send` is called from the push
/// pump and from request handling.
pub trait ObserverSink: Send + Sync + 'static {
    fn send(&self, msg: OutboundMessage) -> Result<()>;
}

/// In-process sink backed by an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ObserverSink for ChannelSink {
    fn send(&self, msg: OutboundMessage) -> Result<()> {
        self.tx
            .send(msg)
            .map_err(|_| anyhow!("observer channel closed").into())
    }
}

/// Writes each message as one line of JSON, flushing after every line.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    out: Mutex<W>,
}

impl<W: Write + Send + 'static> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send + 'static> ObserverSink for JsonLinesSink<W> {
    fn send(&self, msg: OutboundMessage) -> Result<()> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_writer(&mut *out, &msg)?;
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::messages::LogPush;
    use crate::types::RunStatus;

    #[test]
    fn json_lines_are_newline_delimited() {
        let sink = JsonLinesSink::new(Vec::new());
        sink.send(OutboundMessage::Rejected {
            reason: "busy".into(),
        })
        .unwrap();
        sink.send(OutboundMessage::LogPush(LogPush {
            run_id: 1,
            offset: 0,
            content: "a\n".into(),
            status: RunStatus::Running,
        }))
        .unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"type":"rejected","reason":"busy"}"#);

        let back: OutboundMessage = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(back.run_id(), Some(1));
    }

    #[tokio::test]
    async fn channel_sink_reports_closed_observer() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        let err = sink
            .send(OutboundMessage::Rejected { reason: "x".into() })
            .unwrap_err();
        assert!(err.to_string().contains("closed"));
    }
}
