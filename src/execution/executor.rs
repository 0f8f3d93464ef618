//! Stage executor - runs one stage's hooks and steps with per-step isolation

use crate::{
    core::{HookOutcome, RunContext, Stage, StageKind, StageOutcome, StatusState, Step, StepOutcome},
    execution::{
        engine::{EventHandlers, ExecutionEvent},
        runner::{CommandError, CommandRunner},
        RunLog,
    },
    status::StatusReporter,
};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info, warn};

/// Stage lifecycle hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Initialize,
    Finalize,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::Initialize => f.write_str("initialize"),
            Hook::Finalize => f.write_str("finalize"),
        }
    }
}

/// A step command failed; isolated to that step's status
#[derive(Debug, Error)]
#[error("step {context} failed: {source}")]
pub struct StepError {
    pub context: String,
    pub source: CommandError,
}

/// A hook command failed; fatal to its stage only
#[derive(Debug, Error)]
#[error("{stage} {hook} hook failed: {source}")]
pub struct HookError {
    pub stage: StageKind,
    pub hook: Hook,
    pub source: CommandError,
}

/// Everything a stage needs to know about the run it belongs to
#[derive(Debug, Clone, Copy)]
pub struct RunScope<'a> {
    pub run: &'a RunContext,
    /// Checkout root; every command runs here
    pub checkout: &'a Path,
    pub log: &'a RunLog,
}

/// Executes a single stage
pub struct StageExecutor<'a> {
    runner: &'a dyn CommandRunner,
    reporter: &'a StatusReporter,
    events: &'a EventHandlers,
}

impl<'a> StageExecutor<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        reporter: &'a StatusReporter,
        events: &'a EventHandlers,
    ) -> Self {
        Self {
            runner,
            reporter,
            events,
        }
    }

    /// Run `initialize`, every step, then `finalize`
    ///
    /// A failing step is reported as `failure` and the next step still runs.
    /// A failing `initialize` abandons the steps and `finalize`, and marks all
    /// of the stage's checks as `error` so none stays pending.
    pub async fn execute(&self, scope: RunScope<'_>, kind: StageKind, stage: &Stage) -> StageOutcome {
        let mut outcome = StageOutcome::new(kind);
        info!("Starting {} stage ({} steps)", kind, stage.steps.len());
        scope.log.line(format!("Starting {} stage", kind)).await;
        self.events.emit(ExecutionEvent::StageStarted {
            stage: kind,
            steps: stage.steps.len(),
        });

        if let Some(command) = &stage.initialize {
            match self.run_hook(scope, kind, Hook::Initialize, command).await {
                Ok(()) => outcome.initialize = HookOutcome::Succeeded,
                Err(e) => {
                    error!("{}", e);
                    scope
                        .log
                        .line(format!("{}; skipping the rest of the {} stage", e, kind))
                        .await;
                    self.events.emit(ExecutionEvent::HookFailed {
                        stage: kind,
                        hook: Hook::Initialize,
                        error: e.source.to_string(),
                    });

                    outcome.initialize = HookOutcome::Failed {
                        error: e.source.to_string(),
                    };
                    outcome.steps = stage
                        .steps
                        .iter()
                        .map(|s| (s.name.clone(), StepOutcome::Skipped))
                        .collect();
                    if stage.finalize.is_some() {
                        outcome.finalize = HookOutcome::Skipped;
                    }

                    self.reporter.report_batch(
                        scope.run,
                        kind.prefix(),
                        StatusState::Error,
                        &stage.step_names(),
                    );
                    self.finish(kind, &outcome);
                    return outcome;
                }
            }
        }

        for step in &stage.steps {
            let context = kind.context_for(&step.name);
            self.events.emit(ExecutionEvent::StepStarted {
                stage: kind,
                name: step.name.clone(),
            });

            let step_outcome = match self.run_step(scope, &context, step).await {
                Ok(()) => {
                    info!("Step {} succeeded", context);
                    self.events.emit(ExecutionEvent::StepCompleted {
                        stage: kind,
                        name: step.name.clone(),
                    });
                    StepOutcome::Succeeded
                }
                Err(e) => {
                    warn!("{}", e);
                    scope.log.line(e.to_string()).await;
                    self.events.emit(ExecutionEvent::StepFailed {
                        stage: kind,
                        name: step.name.clone(),
                        error: e.source.to_string(),
                    });
                    StepOutcome::Failed {
                        error: e.source.to_string(),
                    }
                }
            };

            self.reporter.report(scope.run, &context, step_outcome.status());
            outcome.steps.push((step.name.clone(), step_outcome));
        }

        if let Some(command) = &stage.finalize {
            outcome.finalize = match self.run_hook(scope, kind, Hook::Finalize, command).await {
                Ok(()) => HookOutcome::Succeeded,
                Err(e) => {
                    warn!("{}", e);
                    scope.log.line(e.to_string()).await;
                    self.events.emit(ExecutionEvent::HookFailed {
                        stage: kind,
                        hook: Hook::Finalize,
                        error: e.source.to_string(),
                    });
                    HookOutcome::Failed {
                        error: e.source.to_string(),
                    }
                }
            };
        }

        self.finish(kind, &outcome);
        outcome
    }

    async fn run_hook(
        &self,
        scope: RunScope<'_>,
        stage: StageKind,
        hook: Hook,
        command: &str,
    ) -> Result<(), HookError> {
        scope.log.line(format!("Running {} {} hook", stage, hook)).await;
        self.runner
            .run(command, scope.checkout, scope.log)
            .await
            .map_err(|source| HookError {
                stage,
                hook,
                source,
            })
    }

    async fn run_step(&self, scope: RunScope<'_>, context: &str, step: &Step) -> Result<(), StepError> {
        scope.log.line(format!("Running step {}", context)).await;
        self.runner
            .run(&step.command, scope.checkout, scope.log)
            .await
            .map_err(|source| StepError {
                context: context.to_string(),
                source,
            })
    }

    fn finish(&self, kind: StageKind, outcome: &StageOutcome) {
        self.events.emit(ExecutionEvent::StageFinished {
            stage: kind,
            succeeded: outcome.succeeded_steps(),
            failed: outcome.failed_steps(),
        });
    }
}
