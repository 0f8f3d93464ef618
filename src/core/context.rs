//! Run context - identity of one pipeline invocation

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use uuid::Uuid;

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("valid regex"));

/// Timestamp format used in artifact ids
const ARTIFACT_TIMESTAMP: &str = "%Y%m%dT%H%M%SZ";

/// Name of the log artifact of one run
///
/// Built as `{timestamp}-{repository}-{pr}` where every character of the
/// repository outside `[A-Za-z0-9._-]` is replaced by `_`. The same id names
/// the log file and appears in every status target URL of the run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogArtifactId(String);

impl LogArtifactId {
    pub fn new(at: DateTime<Utc>, repository: &str, pull_request: u64) -> Self {
        Self(format!(
            "{}-{}-{}",
            at.format(ARTIFACT_TIMESTAMP),
            sanitize(repository),
            pull_request
        ))
    }

    /// Parse an id received from outside, e.g. in a URL path
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() || raw.starts_with('.') || UNSAFE_CHARS.is_match(raw) {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the artifact inside the log directory
    pub fn file_name(&self) -> String {
        format!("{}.log", self.0)
    }
}

impl fmt::Display for LogArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Replace path separators and other unsafe characters with `_`
pub fn sanitize(value: &str) -> String {
    UNSAFE_CHARS.replace_all(value, "_").into_owned()
}

/// Identity of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunContext {
    /// Unique id for log correlation
    pub run_id: Uuid,

    /// Repository in `owner/name` form
    pub repository: String,

    /// Head commit the statuses are attached to
    pub commit_sha: String,

    /// Head branch to check out
    pub branch: String,

    pub pull_request_number: u64,

    pub log_artifact_id: LogArtifactId,
}

impl RunContext {
    /// Create a context for a run starting now
    pub fn new(
        repository: impl Into<String>,
        commit_sha: impl Into<String>,
        branch: impl Into<String>,
        pull_request_number: u64,
    ) -> Self {
        Self::started_at(Utc::now(), repository, commit_sha, branch, pull_request_number)
    }

    pub fn started_at(
        at: DateTime<Utc>,
        repository: impl Into<String>,
        commit_sha: impl Into<String>,
        branch: impl Into<String>,
        pull_request_number: u64,
    ) -> Self {
        let repository = repository.into();
        let log_artifact_id = LogArtifactId::new(at, &repository, pull_request_number);
        Self {
            run_id: Uuid::new_v4(),
            repository,
            commit_sha: commit_sha.into(),
            branch: branch.into(),
            pull_request_number,
            log_artifact_id,
        }
    }
}
