// src/progress/mod.rs

//! Milestone-based progress tracking.
//!
//! A run declares (or lazily discovers) named steps and moves each through
//! `pending -> running -> completed | failed`, or straight to `skipped`.
//! Percent-complete is always derived from the step list, never stored.
//!
//! - [`step`] holds the per-step record and its serializable snapshot.
//! - [`tracker`] holds [`ProgressTracker`] and the scoped [`StepGuard`].

pub mod step;
pub mod tracker;

pub use step::{ProgressState, Step, StepSnapshot, StepStatus};
pub use tracker::{ProgressTracker, StepGuard};
