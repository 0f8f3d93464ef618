//! Pipeline execution engine

pub mod engine;
pub mod executor;
pub mod run_log;
pub mod runner;
pub mod workspace;

pub use engine::{EnvFileError, EventHandler, ExecutionEngine, ExecutionEvent};
pub use executor::{Hook, HookError, RunScope, StageExecutor, StepError};
pub use run_log::RunLog;
pub use runner::{CommandError, CommandRunner, ShellRunner};
pub use workspace::{Workspace, WorkspaceError};
