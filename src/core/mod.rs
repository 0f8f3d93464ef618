//! Core domain models for bomba
//!
//! This module defines the pipeline definition, the identity of a run and
//! the states a run and its status checks move through.

pub mod config;
pub mod context;
pub mod state;

pub use config::{ConfigError, DeclaredSteps, PipelineConfig, Stage, Step, DEFINITION_FILE};
pub use context::*;
pub use state::*;
