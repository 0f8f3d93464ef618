//! Workspace manager - wipe-then-clone checkouts per repository

use crate::core::sanitize;
use crate::execution::runner::{shell_quote, CommandError, CommandRunner};
use crate::execution::RunLog;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Checkout preparation failed; no stage can run
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("invalid repository name '{0}', expected owner/name")]
    InvalidRepository(String),

    #[error("failed to remove {}: {source}", path.display())]
    Cleanup {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to create {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("clone failed: {0}")]
    Clone(#[from] CommandError),
}

/// Root directory holding one checkout per repository
#[derive(Debug, Clone)]
pub struct Workspace {
    work_dir: PathBuf,
}

impl Workspace {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Checkout path for a repository: `{work_dir}/{owner}/{name}`
    pub fn checkout_path(&self, repository: &str) -> Result<PathBuf, WorkspaceError> {
        let (owner, name) = split_repository(repository)?;
        Ok(self.work_dir.join(owner).join(name))
    }

    /// Pre-positioned env file for a repository: `{work_dir}/.{owner}_{name}`
    pub fn env_source(&self, repository: &str) -> PathBuf {
        self.work_dir.join(format!(".{}", sanitize(repository)))
    }

    /// Remove any previous checkout, then shallow-clone `branch` from `source_url`
    pub async fn prepare(
        &self,
        runner: &dyn CommandRunner,
        log: &RunLog,
        repository: &str,
        branch: &str,
        source_url: &str,
    ) -> Result<PathBuf, WorkspaceError> {
        let path = self.checkout_path(repository)?;

        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => log.line(format!("Removed previous checkout {}", path.display())).await,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(WorkspaceError::Cleanup { path, source }),
        }

        let parent = path.parent().unwrap_or(&self.work_dir).to_path_buf();
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|source| WorkspaceError::CreateDir {
                path: parent.clone(),
                source,
            })?;

        let clone = format!(
            "git clone --depth 1 --single-branch --branch {} {} {}",
            shell_quote(branch),
            shell_quote(source_url),
            shell_quote(&path.to_string_lossy())
        );
        runner.run(&clone, &parent, log).await?;

        info!("Checked out {}@{} into {}", repository, branch, path.display());
        Ok(path)
    }
}

fn split_repository(repository: &str) -> Result<(&str, &str), WorkspaceError> {
    let invalid = || WorkspaceError::InvalidRepository(repository.to_string());
    let (owner, name) = repository.split_once('/').ok_or_else(invalid)?;
    let valid = |part: &str| !part.is_empty() && part != "." && part != ".." && sanitize(part) == part;
    if !valid(owner) || !valid(name) {
        return Err(invalid());
    }
    Ok((owner, name))
}
