// src/exec/mod.rs

//! Subprocess execution layer.
//!
//! This module runs external commands for pipeline logic, using
//! `tokio::process::Command`, and streams everything they print into the
//! run's [`LogBuffer`](crate::log::LogBuffer).
//!
//! - [`command`] describes *what* to run ([`CommandSpec`]) and builds the
//!   platform-specific `Command`.
//! - [`runner`] owns [`CommandRunner`], which supervises one process:
//!   output draining, cancellation polling, and graceful-then-forceful
//!   termination.
//! - [`tools`] checks that required programs are on `PATH`.

pub mod command;
pub mod runner;
pub mod tools;

pub use command::{CommandLine, CommandSpec};
pub use runner::{
    CommandRunner, RunnerOptions, CANCELLED_EXIT_CODE, NOT_FOUND_EXIT_CODE,
    SPAWN_FAILED_EXIT_CODE,
};
pub use tools::{find_on_path, require_tool};
