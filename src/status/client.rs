//! Status service clients

use crate::status::StatusUpdate;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// A status update could not be delivered
#[derive(Debug, Error)]
pub enum ReportingError {
    #[error("status request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("status service returned {status}: {message}")]
    Api { status: u16, message: String },
}

/// Destination of status updates
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn send(&self, update: &StatusUpdate) -> Result<(), ReportingError>;
}

/// Body of `POST /repos/{owner}/{repo}/statuses/{sha}`
#[derive(Debug, Serialize)]
struct StatusBody<'a> {
    state: &'a str,
    context: &'a str,
    description: &'a str,
    target_url: &'a str,
}

/// Commit status client for the GitHub REST API
#[derive(Debug, Clone)]
pub struct GitHubStatusClient {
    /// Base URL of the API (e.g., "https://api.github.com")
    api_url: String,
    token: String,
    client: reqwest::Client,
}

impl GitHubStatusClient {
    /// Create a client whose requests give up after `timeout`
    pub fn new(
        api_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ReportingError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("bomba/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(api_url, token, client))
    }

    /// Create a client around a preconfigured reqwest client
    pub fn with_client(api_url: impl Into<String>, token: impl Into<String>, client: reqwest::Client) -> Self {
        let api_url = api_url.into();
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.into(),
            client,
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Endpoint for the statuses of one commit
    pub fn statuses_url(&self, repository: &str, commit_sha: &str) -> String {
        format!("{}/repos/{}/statuses/{}", self.api_url, repository, commit_sha)
    }
}

#[async_trait]
impl StatusSink for GitHubStatusClient {
    async fn send(&self, update: &StatusUpdate) -> Result<(), ReportingError> {
        let url = self.statuses_url(&update.repository, &update.commit_sha);
        let body = StatusBody {
            state: update.state.as_str(),
            context: &update.context,
            description: &update.description,
            target_url: &update.target_url,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ReportingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

/// Sink that only writes updates to the application log
///
/// Used when no status service credentials are configured.
#[derive(Debug, Clone, Default)]
pub struct LogOnlySink;

#[async_trait]
impl StatusSink for LogOnlySink {
    async fn send(&self, update: &StatusUpdate) -> Result<(), ReportingError> {
        info!(
            "status {} {} -> {} ({})",
            update.commit_sha, update.context, update.state, update.description
        );
        Ok(())
    }
}
