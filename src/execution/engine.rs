//! Main execution engine - orchestrates one pipeline run

use crate::{
    core::{ConfigError, DeclaredSteps, PipelineConfig, RunContext, RunPhase, RunReport, StageKind, StatusState},
    execution::{
        executor::{Hook, RunScope, StageExecutor},
        runner::CommandRunner,
        workspace::Workspace,
        RunLog,
    },
    status::StatusReporter,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Status-check context used when the checkout itself fails
pub const WORKSPACE_CONTEXT: &str = "build";

/// Events that can occur during a run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        repository: String,
        pull_request: u64,
    },
    PhaseChanged {
        phase: RunPhase,
    },
    StageStarted {
        stage: StageKind,
        steps: usize,
    },
    StepStarted {
        stage: StageKind,
        name: String,
    },
    StepCompleted {
        stage: StageKind,
        name: String,
    },
    StepFailed {
        stage: StageKind,
        name: String,
        error: String,
    },
    HookFailed {
        stage: StageKind,
        hook: Hook,
        error: String,
    },
    StageFinished {
        stage: StageKind,
        succeeded: usize,
        failed: usize,
    },
    RunCompleted {
        run_id: Uuid,
    },
    RunAborted {
        run_id: Uuid,
        reason: String,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(&ExecutionEvent) + Send + Sync>;

/// Registered event handlers
#[derive(Clone, Default)]
pub struct EventHandlers(Vec<EventHandler>);

impl EventHandlers {
    pub fn push(&mut self, handler: EventHandler) {
        self.0.push(handler);
    }

    /// Emit an event to all handlers
    pub fn emit(&self, event: ExecutionEvent) {
        for handler in &self.0 {
            handler(&event);
        }
    }
}

/// The declared env file could not be put in place
#[derive(Debug, Error)]
#[error("failed to copy env file {} to {}: {source}", from.display(), to.display())]
pub struct EnvFileError {
    pub from: PathBuf,
    pub to: PathBuf,
    pub source: std::io::Error,
}

/// Pipeline execution engine
///
/// Drives one run through `Initializing → Preparing → ConfiguringEnv →
/// Executing(build) → Executing(test) → Completed`, or to `Aborted` when the
/// checkout or the definition cannot be set up.
pub struct ExecutionEngine<R> {
    runner: R,
    reporter: StatusReporter,
    workspace: Workspace,
    log_dir: PathBuf,
    handlers: EventHandlers,
}

impl<R: CommandRunner> ExecutionEngine<R> {
    pub fn new(runner: R, reporter: StatusReporter, workspace: Workspace, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            reporter,
            workspace,
            log_dir: log_dir.into(),
            handlers: EventHandlers::default(),
        }
    }

    /// Add an event handler
    pub fn with_event_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ExecutionEvent) + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(handler));
        self
    }

    pub fn reporter(&self) -> &StatusReporter {
        &self.reporter
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Execute a whole run for `run`, cloning from `source_url`
    pub async fn execute(&self, run: &RunContext, source_url: &str) -> RunReport {
        let span = info_span!(
            "run",
            run_id = %run.run_id,
            repo = %run.repository,
            pr = run.pull_request_number
        );
        self.execute_run(run, source_url).instrument(span).await
    }

    async fn execute_run(&self, run: &RunContext, source_url: &str) -> RunReport {
        // Initializing
        self.enter(RunPhase::Initializing);
        let log = match RunLog::create(&self.log_dir, &run.log_artifact_id).await {
            Ok(log) => log,
            Err(e) => {
                warn!("Could not open run log {}: {}", run.log_artifact_id, e);
                RunLog::disabled()
            }
        };
        info!(
            "Started processing PR #{} of {} at {}",
            run.pull_request_number, run.repository, run.commit_sha
        );
        log.line(format!(
            "Started processing PR #{} of {} ({} at {})",
            run.pull_request_number, run.repository, run.branch, run.commit_sha
        ))
        .await;
        self.handlers.emit(ExecutionEvent::RunStarted {
            run_id: run.run_id,
            repository: run.repository.clone(),
            pull_request: run.pull_request_number,
        });

        // Preparing
        self.enter(RunPhase::Preparing);
        let checkout = match self
            .workspace
            .prepare(&self.runner, &log, &run.repository, &run.branch, source_url)
            .await
        {
            Ok(path) => path,
            Err(e) => {
                self.reporter.report(run, WORKSPACE_CONTEXT, StatusState::Error);
                return self
                    .abort(run, &log, format!("Workspace preparation failed: {}", e))
                    .await;
            }
        };

        // ConfiguringEnv
        self.enter(RunPhase::ConfiguringEnv);
        let config = match self.configure(run, &checkout, &log).await {
            Ok(config) => config,
            Err((reason, declared)) => {
                self.report_declared(run, StatusState::Error, &declared);
                return self.abort(run, &log, reason).await;
            }
        };

        self.report_declared(run, StatusState::Pending, &config.declared_steps());

        let scope = RunScope {
            run,
            checkout: &checkout,
            log: &log,
        };
        let stage_executor = StageExecutor::new(&self.runner, &self.reporter, &self.handlers);
        let mut stages = Vec::new();
        for (kind, stage) in config.stages() {
            self.enter(RunPhase::Executing(kind));
            stages.push(stage_executor.execute(scope, kind, stage).await);
        }

        // Completed
        self.enter(RunPhase::Completed);
        info!("Finished processing PR #{}", run.pull_request_number);
        log.line(format!("Finished processing PR #{}", run.pull_request_number))
            .await;
        self.handlers.emit(ExecutionEvent::RunCompleted { run_id: run.run_id });

        RunReport {
            phase: RunPhase::Completed,
            abort_reason: None,
            stages,
        }
    }

    /// Load the definition and put the env file in place
    ///
    /// On failure returns the reason and the steps whose checks must be
    /// marked `error`.
    async fn configure(
        &self,
        run: &RunContext,
        checkout: &Path,
        log: &RunLog,
    ) -> Result<PipelineConfig, (String, DeclaredSteps)> {
        let config = PipelineConfig::load(checkout).map_err(|e: ConfigError| {
            let salvaged = e.salvaged();
            (format!("Pipeline definition could not be loaded: {}", e), salvaged)
        })?;

        if let Some(env_file) = &config.env_file {
            self.copy_env_file(&run.repository, checkout, env_file)
                .await
                .map_err(|e| (e.to_string(), config.declared_steps()))?;
            log.line(format!("Copied env file {}", env_file)).await;
        }

        Ok(config)
    }

    async fn copy_env_file(
        &self,
        repository: &str,
        checkout: &Path,
        env_file: &str,
    ) -> Result<(), EnvFileError> {
        let from = self.workspace.env_source(repository);
        let to = checkout.join(env_file);
        let wrap = |source| EnvFileError {
            from: from.clone(),
            to: to.clone(),
            source,
        };

        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(wrap)?;
        }
        tokio::fs::copy(&from, &to).await.map_err(wrap)?;
        Ok(())
    }

    fn report_declared(&self, run: &RunContext, state: StatusState, declared: &DeclaredSteps) {
        for kind in StageKind::ORDER {
            self.reporter
                .report_batch(run, kind.prefix(), state, declared.get(kind));
        }
    }

    async fn abort(&self, run: &RunContext, log: &RunLog, reason: String) -> RunReport {
        error!("Run aborted: {}", reason);
        log.line(format!("Run aborted: {}", reason)).await;
        self.enter(RunPhase::Aborted);
        self.handlers.emit(ExecutionEvent::RunAborted {
            run_id: run.run_id,
            reason: reason.clone(),
        });
        RunReport::aborted(reason)
    }

    fn enter(&self, phase: RunPhase) {
        self.handlers.emit(ExecutionEvent::PhaseChanged { phase });
    }
}
