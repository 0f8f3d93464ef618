//! Pull request webhook
//!
//! Verifies the payload signature, filters out events that should not start
//! a run, acknowledges immediately and hands the run to a background task.

use crate::{
    core::RunContext,
    execution::CommandRunner,
    server::{
        error::{ApiError, ApiResult},
        AppState,
    },
    settings::CloneProtocol,
};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const EVENT_HEADER: &str = "x-github-event";
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";

/// The parts of a `pull_request` event a run needs
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    #[serde(default)]
    pub action: Option<String>,
    pub number: u64,
    pub pull_request: PullRequest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    pub head: Head,
    pub base: Base,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Head {
    pub sha: String,
    #[serde(rename = "ref")]
    pub branch: String,
    pub repo: Repository,
}

/// The branch the pull request targets; its repository owns the checks
#[derive(Debug, Clone, Deserialize)]
pub struct Base {
    pub repo: Repository,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub full_name: String,
    #[serde(default)]
    pub ssh_url: Option<String>,
    #[serde(default)]
    pub clone_url: Option<String>,
}

impl PullRequestEvent {
    /// Closed pull requests have nothing left to check
    pub fn should_run(&self) -> bool {
        self.action.as_deref() != Some("closed")
    }

    /// Clone URL for the head repository, falling back to the other protocol
    pub fn source_url(&self, protocol: CloneProtocol) -> Option<&str> {
        let repo = &self.pull_request.head.repo;
        let (preferred, fallback) = match protocol {
            CloneProtocol::Ssh => (&repo.ssh_url, &repo.clone_url),
            CloneProtocol::Https => (&repo.clone_url, &repo.ssh_url),
        };
        preferred.as_deref().or(fallback.as_deref())
    }

    /// Link shown in the acknowledgement
    pub fn link(&self) -> &str {
        self.pull_request
            .html_url
            .as_deref()
            .or(self.pull_request.url.as_deref())
            .unwrap_or_default()
    }

    /// Statuses go to the base repository, so pull requests from forks still
    /// show their checks
    pub fn run_context(&self) -> RunContext {
        let head = &self.pull_request.head;
        let base = &self.pull_request.base;
        RunContext::new(&base.repo.full_name, &head.sha, &head.branch, self.number)
    }
}

/// `sha256=<hex>` signature of `body` under `secret`
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(body);
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a `sha256=<hex>` signature header
pub fn verify_signature(secret: &[u8], body: &[u8], header: Option<&str>) -> bool {
    let Some(expected) = header
        .and_then(|h| h.trim().strip_prefix(SIGNATURE_PREFIX))
        .and_then(|h| hex::decode(h).ok())
    else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// POST {webhook_path}
/// Acknowledge a pull request event and start its run
pub async fn receive<R: CommandRunner + 'static>(
    State(state): State<AppState<R>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, String)> {
    if let Some(secret) = &state.webhook_secret {
        let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
        if !verify_signature(secret.as_bytes(), &body, signature) {
            return Err(ApiError::Unauthorized(
                "Webhook signature could not be verified".to_string(),
            ));
        }
    }

    let event = headers
        .get(EVENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if event != "pull_request" {
        tracing::debug!("Ignoring {:?} event", event);
        return Ok((
            StatusCode::OK,
            "Ignoring event types other than pull requests".to_string(),
        ));
    }

    let payload: PullRequestEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Malformed pull request payload: {}", e)))?;

    if !payload.should_run() {
        tracing::debug!("Ignoring closed PR #{}", payload.number);
        return Ok((
            StatusCode::OK,
            format!("Ignoring closed PR #{}", payload.number),
        ));
    }

    let source_url = payload
        .source_url(state.clone_protocol)
        .ok_or_else(|| ApiError::BadRequest("Head repository has no clone URL".to_string()))?
        .to_string();

    let run = payload.run_context();
    tracing::info!(
        "Accepted PR #{} of {} ({})",
        payload.number,
        run.repository,
        run.log_artifact_id
    );
    state.spawn_run(run, source_url);

    Ok((
        StatusCode::ACCEPTED,
        format!("Started processing PR #{}: {}", payload.number, payload.link()),
    ))
}
