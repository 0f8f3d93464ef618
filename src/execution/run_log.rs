//! Per-run log artifact
//!
//! A `RunLog` is a handle to the append-only log file of one run. It is
//! passed to every command invocation of that run.

use crate::core::LogArtifactId;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RunLog {
    sink: Option<Arc<Mutex<File>>>,
    path: Option<PathBuf>,
}

impl RunLog {
    /// Open (or create) `{log_dir}/{artifact}.log` for appending
    pub async fn create(log_dir: &Path, artifact: &LogArtifactId) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(log_dir).await?;
        let path = log_dir.join(artifact.file_name());
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            sink: Some(Arc::new(Mutex::new(file))),
            path: Some(path),
        })
    }

    /// A log that drops everything written to it
    pub fn disabled() -> Self {
        Self {
            sink: None,
            path: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append a timestamped line
    pub async fn line(&self, message: impl AsRef<str>) {
        let entry = format!(
            "[{}] {}\n",
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
            message.as_ref()
        );
        self.write(entry.as_bytes()).await;
    }

    /// Append a captured output stream of a command
    pub async fn output(&self, label: &str, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let text = String::from_utf8_lossy(bytes);
        let mut entry = format!("{}:\n{}", label, text);
        if !entry.ends_with('\n') {
            entry.push('\n');
        }
        self.write(entry.as_bytes()).await;
    }

    async fn write(&self, bytes: &[u8]) {
        let Some(sink) = &self.sink else {
            return;
        };
        let mut file = sink.lock().await;
        let result = match file.write_all(bytes).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!("Failed to write run log {:?}: {}", self.path, e);
        }
    }

    /// Read back a whole artifact from the log directory
    pub async fn read_artifact(log_dir: &Path, artifact: &LogArtifactId) -> std::io::Result<String> {
        tokio::fs::read_to_string(log_dir.join(artifact.file_name())).await
    }
}
