//! Resolved service settings

use crate::status::{GitHubStatusClient, LogOnlySink, RetryPolicy, StatusReporter};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Which clone URL of the head repository to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CloneProtocol {
    #[default]
    Ssh,
    Https,
}

/// Settings shared by the server and one-off runs
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root of the per-repository checkouts and env files
    pub work_dir: PathBuf,

    /// Directory holding one log artifact per run
    pub log_dir: PathBuf,

    /// Externally reachable base URL; status links point at `{public_url}/logs/{id}`
    pub public_url: String,

    /// Status service API base URL
    pub github_api_url: String,

    /// Token for the status service; statuses are only logged without one
    pub github_token: Option<String>,

    pub clone_protocol: CloneProtocol,

    /// Per-command timeout for build and test commands
    pub command_timeout_secs: u64,

    /// Per-request timeout for status updates
    pub status_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        let work_dir = default_work_dir();
        Self {
            log_dir: work_dir.join("logs"),
            work_dir,
            public_url: "http://localhost:3000".to_string(),
            github_api_url: "https://api.github.com".to_string(),
            github_token: None,
            clone_protocol: CloneProtocol::Ssh,
            command_timeout_secs: 3600,
            status_timeout_secs: 10,
        }
    }
}

impl Settings {
    /// Start a status reporter matching these settings
    ///
    /// Must be called from within a tokio runtime.
    pub fn status_reporter(&self) -> Result<StatusReporter> {
        let policy = RetryPolicy::default();
        match &self.github_token {
            Some(token) => {
                let client = GitHubStatusClient::new(
                    &self.github_api_url,
                    token,
                    Duration::from_secs(self.status_timeout_secs),
                )
                .context("Failed to build status client")?;
                Ok(StatusReporter::spawn(client, &self.public_url, policy))
            }
            None => {
                warn!("No status service token configured; statuses will only be logged");
                Ok(StatusReporter::spawn(LogOnlySink, &self.public_url, policy))
            }
        }
    }
}

/// `<data dir>/bomba`, falling back to `./bomba`
pub fn default_work_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bomba")
}
