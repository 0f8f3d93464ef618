//! bomba - pull request CI service
//!
//! Checks out a pull request branch, runs the build and test stages declared
//! in its `bomba.yml`, and mirrors every step into a commit status check.

pub mod cli;
pub mod core;
pub mod execution;
pub mod server;
pub mod settings;
pub mod status;

// Re-export commonly used types
pub use crate::core::{PipelineConfig, RunContext, RunReport, StageKind, StatusState};
pub use crate::execution::{CommandRunner, ExecutionEngine, ExecutionEvent, ShellRunner, Workspace};
pub use crate::settings::Settings;
pub use crate::status::{StatusReporter, StatusSink, StatusUpdate};
