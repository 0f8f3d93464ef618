//! CLI command definitions

use crate::core::DEFINITION_FILE;
use crate::server::DEFAULT_WEBHOOK_PATH;
use crate::settings::{default_work_dir, CloneProtocol, Settings};
use anyhow::{bail, Result};
use clap::Args;
use std::path::PathBuf;

/// Settings shared by `serve` and `run`
#[derive(Debug, Args, Clone)]
pub struct ServiceArgs {
    /// Directory holding checkouts and pre-positioned env files
    #[arg(long, env = "BOMBA_WORK_DIR")]
    pub work_dir: Option<PathBuf>,

    /// Directory for run logs (defaults to <work-dir>/logs)
    #[arg(long, env = "BOMBA_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Externally reachable base URL used in status links
    #[arg(long, env = "BOMBA_PUBLIC_URL", default_value = "http://localhost:3000")]
    pub public_url: String,

    /// Status service API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = "https://api.github.com")]
    pub github_api_url: String,

    /// Token used to post commit statuses; statuses are only logged without one
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Which clone URL of the head repository to use
    #[arg(long, value_enum, env = "BOMBA_CLONE_PROTOCOL", default_value_t = CloneProtocol::Ssh)]
    pub clone_protocol: CloneProtocol,

    /// Timeout for each build or test command, in seconds
    #[arg(long, env = "BOMBA_COMMAND_TIMEOUT_SECS", default_value_t = 3600)]
    pub command_timeout: u64,

    /// Timeout for each status request, in seconds
    #[arg(long, env = "BOMBA_STATUS_TIMEOUT_SECS", default_value_t = 10)]
    pub status_timeout: u64,
}

impl ServiceArgs {
    pub fn settings(&self) -> Settings {
        let work_dir = self.work_dir.clone().unwrap_or_else(default_work_dir);
        Settings {
            log_dir: self.log_dir.clone().unwrap_or_else(|| work_dir.join("logs")),
            work_dir,
            public_url: self.public_url.clone(),
            github_api_url: self.github_api_url.clone(),
            github_token: self.github_token.clone().filter(|t| !t.is_empty()),
            clone_protocol: self.clone_protocol,
            command_timeout_secs: self.command_timeout,
            status_timeout_secs: self.status_timeout,
        }
    }
}

/// Serve the pull request webhook
#[derive(Debug, Args, Clone)]
pub struct ServeCommand {
    /// Address to listen on
    #[arg(long, env = "BOMBA_BIND_ADDR", default_value = "0.0.0.0:3000")]
    pub bind: String,

    /// Route of the webhook endpoint
    #[arg(long, env = "BOMBA_WEBHOOK_PATH", default_value = DEFAULT_WEBHOOK_PATH)]
    pub webhook_path: String,

    /// Shared secret for webhook signatures
    #[arg(long, env = "BOMBA_WEBHOOK_SECRET", hide_env_values = true)]
    pub webhook_secret: Option<String>,

    /// Accept unsigned webhooks when no secret is configured
    #[arg(long)]
    pub insecure_skip_signature: bool,

    #[command(flatten)]
    pub service: ServiceArgs,
}

impl ServeCommand {
    /// Secret the webhook verifies against
    ///
    /// Refuses to start without one unless verification was explicitly
    /// switched off, which yields `None`.
    pub fn signature_secret(&self) -> Result<Option<String>> {
        match self.webhook_secret.as_deref().filter(|s| !s.is_empty()) {
            Some(secret) => Ok(Some(secret.to_string())),
            None if self.insecure_skip_signature => {
                tracing::warn!("Webhook signature verification is disabled; any request can start a run");
                Ok(None)
            }
            None => bail!(
                "No webhook secret configured; set BOMBA_WEBHOOK_SECRET or pass --insecure-skip-signature"
            ),
        }
    }
}

/// Run the pipeline of one repository branch
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Repository in owner/name form
    pub repository: String,

    /// Branch to check out
    #[arg(short, long, default_value = "main")]
    pub branch: String,

    /// Commit statuses are posted for; required when a token is set
    #[arg(long)]
    pub sha: Option<String>,

    /// Pull request number used in the log artifact id
    #[arg(long, default_value_t = 0)]
    pub pr: u64,

    /// Clone URL (defaults to the repository on github.com)
    #[arg(long)]
    pub url: Option<String>,

    #[command(flatten)]
    pub service: ServiceArgs,
}

impl RunCommand {
    /// Commit the run reports against
    ///
    /// Statuses need a real commit id, so `HEAD` is only a stand-in when
    /// nothing is posted.
    pub fn commit_sha(&self, settings: &Settings) -> Result<String> {
        match (&self.sha, &settings.github_token) {
            (Some(sha), _) => Ok(sha.clone()),
            (None, Some(_)) => bail!("--sha is required when GITHUB_TOKEN is set"),
            (None, None) => Ok("HEAD".to_string()),
        }
    }

    pub fn source_url(&self, protocol: CloneProtocol) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        match protocol {
            CloneProtocol::Ssh => format!("git@github.com:{}.git", self.repository),
            CloneProtocol::Https => format!("https://github.com/{}.git", self.repository),
        }
    }
}

/// Validate a pipeline definition file
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to the definition file
    #[arg(short, long, default_value = DEFINITION_FILE)]
    pub file: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}
