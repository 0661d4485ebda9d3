// src/transport/mod.rs

//! Observer-facing side of a run.
//!
//! Output reaches a remote observer two ways: eager pushes of each new log
//! chunk, and polls for everything past an offset the observer already
//! holds. Both are answered straight from the [`LogBuffer`](crate::log::LogBuffer),
//! so the core never tracks what an observer has seen. The observer does
//! that with [`ObserverCursor`].
//!
//! - [`messages`]: wire shapes, JSON with a `type` tag.
//! - [`sink`]: where outbound messages go ([`ObserverSink`]).
//! - [`service`]: [`Transport`], which answers requests and pumps pushes.
//! - [`cursor`]: client-side reconciliation.

pub mod cursor;
pub mod messages;
pub mod service;
pub mod sink;

pub use cursor::{CursorUpdate, ObserverCursor};
pub use messages::{InboundMessage, LogPush, OutboundMessage, PollResponse, RunFinished};
pub use service::Transport;
pub use sink::{ChannelSink, JsonLinesSink, ObserverSink};
