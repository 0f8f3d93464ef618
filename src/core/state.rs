//! Run and status state models

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two pipeline phases, in their fixed execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Build,
    Test,
}

impl StageKind {
    /// Stages in execution order. Build always precedes test.
    pub const ORDER: [StageKind; 2] = [StageKind::Build, StageKind::Test];

    /// Prefix used when deriving status-check contexts
    pub fn prefix(&self) -> &'static str {
        match self {
            StageKind::Build => "build",
            StageKind::Test => "test",
        }
    }

    /// Status-check context for a step of this stage: `<stage>-<name>`
    pub fn context_for(&self, step_name: &str) -> String {
        format!("{}-{}", self.prefix(), step_name)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// State of a remote status check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusState {
    /// Queued, not started yet
    Pending,
    /// Attempted and succeeded
    Success,
    /// Attempted and failed
    Failure,
    /// Could not be attempted at all
    Error,
}

impl StatusState {
    /// Wire value sent to the status service
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusState::Pending => "pending",
            StatusState::Success => "success",
            StatusState::Failure => "failure",
            StatusState::Error => "error",
        }
    }

    /// Human-readable phrase used in status descriptions
    pub fn phrase(&self) -> &'static str {
        match self {
            StatusState::Pending => "queued",
            StatusState::Success => "successful",
            StatusState::Failure => "failed",
            StatusState::Error => "could not be started",
        }
    }
}

impl fmt::Display for StatusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase of a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    /// Binding the run log
    Initializing,
    /// Cloning the workspace
    Preparing,
    /// Loading the definition and copying the env file
    ConfiguringEnv,
    /// Running a stage
    Executing(StageKind),
    /// Every present stage was executed
    Completed,
    /// Unrecoverable failure before any stage ran
    Aborted,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Completed | RunPhase::Aborted)
    }
}

/// Outcome of a single step command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded,
    Failed { error: String },
    /// Never run because the stage initialize hook failed
    Skipped,
}

impl StepOutcome {
    /// The status-check state that mirrors this outcome
    pub fn status(&self) -> StatusState {
        match self {
            StepOutcome::Succeeded => StatusState::Success,
            StepOutcome::Failed { .. } => StatusState::Failure,
            StepOutcome::Skipped => StatusState::Error,
        }
    }
}

/// Outcome of a stage hook (`initialize` or `finalize`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// The hook is not declared
    NotDeclared,
    Succeeded,
    Failed { error: String },
    /// Declared but not run (initialize failed)
    Skipped,
}

impl HookOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, HookOutcome::Failed { .. })
    }
}

/// What happened to one stage during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    pub kind: StageKind,
    pub initialize: HookOutcome,
    /// Step name and outcome, in execution order
    pub steps: Vec<(String, StepOutcome)>,
    pub finalize: HookOutcome,
}

impl StageOutcome {
    pub fn new(kind: StageKind) -> Self {
        Self {
            kind,
            initialize: HookOutcome::NotDeclared,
            steps: Vec::new(),
            finalize: HookOutcome::NotDeclared,
        }
    }

    pub fn step(&self, name: &str) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|(step_name, _)| step_name == name)
            .map(|(_, outcome)| outcome)
    }

    pub fn failed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|(_, o)| matches!(o, StepOutcome::Failed { .. }))
            .count()
    }

    pub fn succeeded_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|(_, o)| matches!(o, StepOutcome::Succeeded))
            .count()
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Terminal phase: `Completed` or `Aborted`
    pub phase: RunPhase,
    /// Why the run aborted, if it did
    pub abort_reason: Option<String>,
    /// Stages that were present in the definition, in execution order
    pub stages: Vec<StageOutcome>,
}

impl RunReport {
    pub fn aborted(reason: String) -> Self {
        Self {
            phase: RunPhase::Aborted,
            abort_reason: Some(reason),
            stages: Vec::new(),
        }
    }

    pub fn stage(&self, kind: StageKind) -> Option<&StageOutcome> {
        self.stages.iter().find(|s| s.kind == kind)
    }

    pub fn is_completed(&self) -> bool {
        self.phase == RunPhase::Completed
    }

    /// True when the run completed and no step or hook failed
    pub fn is_green(&self) -> bool {
        self.is_completed()
            && self.stages.iter().all(|s| {
                s.failed_steps() == 0 && !s.initialize.is_failed() && !s.finalize.is_failed()
            })
    }
}
