// src/config/mod.rs

//! Pipeline configuration.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Check it before any run starts (`validate.rs`).
//! - Parse the duration strings it uses (`duration.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{PipelineConfig, PipelineSection, RawConfigFile, RawRunnerSection, StepConfig};
pub use validate::validate_raw_config;
