//! Shell command runner - the only place build and test work touches the system

use crate::execution::RunLog;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Longest stderr tail kept in an error message
const STDERR_TAIL: usize = 2000;

/// Errors from running one shell command
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("`{command}` exited with code {code}: {stderr}")]
    Exit {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("`{command}` timed out after {secs} seconds")]
    Timeout { command: String, secs: u64 },
}

impl CommandError {
    pub fn command(&self) -> &str {
        match self {
            CommandError::Spawn { command, .. }
            | CommandError::Exit { command, .. }
            | CommandError::Timeout { command, .. } => command,
        }
    }
}

/// Executes shell command strings and resolves on their exit status
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` with `cwd` as working directory, appending its output to `log`
    async fn run(&self, command: &str, cwd: &Path, log: &RunLog) -> Result<(), CommandError>;
}

/// Runs commands through `sh -c`
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
    timeout_secs: u64,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            timeout_secs: 3600,
        }
    }
}

impl ShellRunner {
    /// Create a runner with a per-command timeout
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout_secs,
            ..Self::default()
        }
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, cwd: &Path, log: &RunLog) -> Result<(), CommandError> {
        debug!("Running `{}` in {}", command, cwd.display());
        log.line(format!("Running command: {}", command)).await;

        let result = timeout(
            Duration::from_secs(self.timeout_secs),
            Command::new(&self.shell)
                .arg("-c")
                .arg(command)
                .current_dir(cwd)
                .kill_on_drop(true)
                .output(),
        )
        .await;

        let output = match result {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                log.line(format!("Failed to spawn command: {}", source)).await;
                return Err(CommandError::Spawn {
                    command: command.to_string(),
                    source,
                });
            }
            Err(_) => {
                log.line(format!("Command timed out after {}s", self.timeout_secs))
                    .await;
                return Err(CommandError::Timeout {
                    command: command.to_string(),
                    secs: self.timeout_secs,
                });
            }
        };

        log.output("Stdout", &output.stdout).await;
        log.output("Stderr", &output.stderr).await;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = tail(stderr.trim(), STDERR_TAIL);
            warn!("`{}` exited with code {}", command, code);
            log.line(format!("Command exited with code {}", code)).await;
            return Err(CommandError::Exit {
                command: command.to_string(),
                code,
                stderr,
            });
        }

        Ok(())
    }
}

fn tail(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}

/// Quote a value for safe interpolation into a `sh -c` command line
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
