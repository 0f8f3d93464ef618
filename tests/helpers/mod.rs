//! Test utilities for bomba scenarios

#![allow(dead_code)]

use async_trait::async_trait;
use bomba::core::{RunContext, RunReport, StatusState, DEFINITION_FILE};
use bomba::execution::{CommandError, CommandRunner, ExecutionEngine, ExecutionEvent, RunLog, Workspace};
use bomba::status::{ReportingError, RetryPolicy, StatusReporter, StatusSink, StatusUpdate};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const REPOSITORY: &str = "acme/widgets";
pub const SOURCE_URL: &str = "git@example.com:acme/widgets.git";
pub const PUBLIC_URL: &str = "http://ci.example.com";

/// Command runner that pretends to clone and fails scripted commands
///
/// A `git clone` creates the target directory and writes the definition file
/// (when one is scripted). Every other command is recorded with its working
/// directory.
pub struct ScriptedRunner {
    definition: Option<String>,
    failing: HashSet<String>,
    fail_clone: bool,
    executed: Arc<Mutex<Vec<(String, PathBuf)>>>,
}

impl ScriptedRunner {
    pub fn with_definition(yaml: &str) -> Self {
        Self {
            definition: Some(yaml.to_string()),
            failing: HashSet::new(),
            fail_clone: false,
            executed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn without_definition() -> Self {
        Self {
            definition: None,
            ..Self::with_definition("")
        }
    }

    /// Make `command` exit non-zero
    pub fn failing(mut self, command: &str) -> Self {
        self.failing.insert(command.to_string());
        self
    }

    pub fn failing_clone(mut self) -> Self {
        self.fail_clone = true;
        self
    }

    pub fn executed(&self) -> Arc<Mutex<Vec<(String, PathBuf)>>> {
        Arc::clone(&self.executed)
    }
}

/// Last argument of a clone command, without shell quoting
fn clone_target(command: &str) -> PathBuf {
    let last = command.rsplit(' ').next().unwrap_or_default();
    PathBuf::from(last.trim_matches('\''))
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &str, cwd: &Path, log: &RunLog) -> Result<(), CommandError> {
        log.line(format!("Running command: {}", command)).await;

        if command.starts_with("git clone") {
            if self.fail_clone {
                return Err(CommandError::Exit {
                    command: command.to_string(),
                    code: 128,
                    stderr: "fatal: repository not found".to_string(),
                });
            }
            let target = clone_target(command);
            std::fs::create_dir_all(&target).unwrap();
            if let Some(definition) = &self.definition {
                std::fs::write(target.join(DEFINITION_FILE), definition).unwrap();
            }
            return Ok(());
        }

        self.executed
            .lock()
            .unwrap()
            .push((command.to_string(), cwd.to_path_buf()));

        if self.failing.contains(command) {
            return Err(CommandError::Exit {
                command: command.to_string(),
                code: 1,
                stderr: format!("{}: failed", command),
            });
        }
        Ok(())
    }
}

/// Status sink that records every delivered update
#[derive(Clone, Default)]
pub struct RecordingSink {
    updates: Arc<Mutex<Vec<StatusUpdate>>>,
}

#[async_trait]
impl StatusSink for RecordingSink {
    async fn send(&self, update: &StatusUpdate) -> Result<(), ReportingError> {
        self.updates.lock().unwrap().push(update.clone());
        Ok(())
    }
}

impl RecordingSink {
    pub fn updates(&self) -> Vec<StatusUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

/// Everything observable about one finished run
pub struct RunResult {
    pub run: RunContext,
    pub report: RunReport,
    pub updates: Vec<StatusUpdate>,
    pub executed: Vec<(String, PathBuf)>,
    pub events: Vec<ExecutionEvent>,
    pub work_dir: PathBuf,
    pub log_dir: PathBuf,
    // Keeps the workspace alive while the result is inspected
    _dir: Arc<TempDir>,
}

impl RunResult {
    /// `(context, state)` of every status update, in delivery order
    pub fn calls(&self) -> Vec<(String, StatusState)> {
        self.updates
            .iter()
            .map(|u| (u.context.clone(), u.state))
            .collect()
    }

    /// Step commands in execution order
    pub fn commands(&self) -> Vec<String> {
        self.executed.iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn checkout(&self) -> PathBuf {
        self.work_dir.join(REPOSITORY)
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_dir.join(self.run.log_artifact_id.file_name())
    }

    pub fn log_contents(&self) -> String {
        std::fs::read_to_string(self.log_path()).unwrap_or_default()
    }

    pub fn states_for(&self, context: &str) -> Vec<StatusState> {
        self.updates
            .iter()
            .filter(|u| u.context == context)
            .map(|u| u.state)
            .collect()
    }
}

/// Builds an engine around a scripted runner and a recording sink
pub struct Harness {
    dir: Arc<TempDir>,
    runner: ScriptedRunner,
}

impl Harness {
    pub fn new(runner: ScriptedRunner) -> Self {
        Self {
            dir: Arc::new(tempfile::tempdir().unwrap()),
            runner,
        }
    }

    pub fn work_dir(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.dir.path().join("logs")
    }

    /// Place the pre-positioned env file for the repository
    pub fn with_env_source(self, contents: &str) -> Self {
        let workspace = Workspace::new(self.work_dir());
        let source = workspace.env_source(REPOSITORY);
        std::fs::create_dir_all(source.parent().unwrap()).unwrap();
        std::fs::write(source, contents).unwrap();
        self
    }

    pub async fn run(self) -> RunResult {
        let run = RunContext::new(REPOSITORY, "0123abcd", "feature", 42);
        self.run_context(run).await
    }

    pub async fn run_context(self, run: RunContext) -> RunResult {
        let sink = RecordingSink::default();
        let reporter = StatusReporter::spawn(
            sink.clone(),
            PUBLIC_URL,
            RetryPolicy {
                attempts: 1,
                backoff: Duration::ZERO,
            },
        );
        let events = Arc::new(Mutex::new(Vec::new()));
        let executed = self.runner.executed();
        let work_dir = self.work_dir();
        let log_dir = self.log_dir();

        let recorded = Arc::clone(&events);
        let engine = ExecutionEngine::new(self.runner, reporter.clone(), Workspace::new(&work_dir), &log_dir)
            .with_event_handler(move |event| recorded.lock().unwrap().push(event.clone()));

        let report = engine.execute(&run, SOURCE_URL).await;
        reporter.flush().await;

        let executed = executed.lock().unwrap().clone();
        let events = events.lock().unwrap().clone();
        RunResult {
            work_dir,
            log_dir,
            run,
            report,
            updates: sink.updates(),
            executed,
            events,
            _dir: self.dir,
        }
    }
}

/// Run a definition through a fresh harness
pub async fn run_definition(yaml: &str) -> RunResult {
    Harness::new(ScriptedRunner::with_definition(yaml)).run().await
}

/// Run a definition where the given commands fail
pub async fn run_definition_failing(yaml: &str, failing: &[&str]) -> RunResult {
    let runner = failing
        .iter()
        .fold(ScriptedRunner::with_definition(yaml), |r, c| r.failing(c));
    Harness::new(runner).run().await
}

pub fn pending(context: &str) -> (String, StatusState) {
    (context.to_string(), StatusState::Pending)
}

pub fn success(context: &str) -> (String, StatusState) {
    (context.to_string(), StatusState::Success)
}

pub fn failure(context: &str) -> (String, StatusState) {
    (context.to_string(), StatusState::Failure)
}

pub fn error(context: &str) -> (String, StatusState) {
    (context.to_string(), StatusState::Error)
}
