// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::{default_config_path, parse_duration};

/// Command-line arguments for `runwire`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "runwire",
    version,
    about = "Run a configured pipeline once and stream its output.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the pipeline file (TOML).
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `RUNWIRE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the steps, but don't execute any commands.
    #[arg(long)]
    pub dry_run: bool,

    /// How often the observer polls for output it may have missed.
    #[arg(long, value_name = "DUR", default_value = "500ms", value_parser = parse_poll_interval)]
    pub poll_interval: Duration,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

fn parse_poll_interval(s: &str) -> Result<Duration, String> {
    let dur = parse_duration(s).map_err(|e| e.to_string())?;
    if dur.is_zero() {
        return Err("poll interval must be greater than zero".to_string());
    }
    Ok(dur)
}
