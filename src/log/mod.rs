// src/log/mod.rs

//! Run output.
//!
//! - [`buffer`] holds the append-only [`LogBuffer`] every run writes into.
//! - [`styled`] provides [`PipelineLogger`], which formats status lines with
//!   ANSI styles before appending them.

pub mod buffer;
pub mod styled;

pub use buffer::{LogBuffer, LogChunk};
pub use styled::PipelineLogger;
