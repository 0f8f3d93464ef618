//! Webhook server
//!
//! HTTP surface of the service: the pull request webhook, log artifact
//! retrieval and a health check.

pub mod error;
pub mod logs;
pub mod webhook;

use crate::{
    core::{RunContext, RunReport},
    execution::{CommandRunner, ExecutionEngine},
    settings::CloneProtocol,
};
use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

/// Default route of the webhook endpoint
pub const DEFAULT_WEBHOOK_PATH: &str = "/webhook";

/// Shared state handed to every handler
pub struct AppState<R> {
    pub engine: Arc<ExecutionEngine<R>>,
    /// HMAC key for webhook signatures; `None` only when verification was skipped explicitly
    pub webhook_secret: Option<Arc<str>>,
    pub clone_protocol: CloneProtocol,
    pub locks: RepoLocks,
}

impl<R> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            webhook_secret: self.webhook_secret.clone(),
            clone_protocol: self.clone_protocol,
            locks: self.locks.clone(),
        }
    }
}

impl<R: CommandRunner + 'static> AppState<R> {
    pub fn new(engine: ExecutionEngine<R>, webhook_secret: Option<String>, clone_protocol: CloneProtocol) -> Self {
        Self {
            engine: Arc::new(engine),
            webhook_secret: webhook_secret.filter(|s| !s.is_empty()).map(Arc::from),
            clone_protocol,
            locks: RepoLocks::default(),
        }
    }

    /// Run a pipeline in the background
    ///
    /// Runs against the same repository share a checkout directory, so they
    /// queue behind each other; other repositories proceed concurrently.
    pub fn spawn_run(&self, run: RunContext, source_url: String) -> JoinHandle<RunReport> {
        let engine = Arc::clone(&self.engine);
        let lock = self.locks.lock_for(&run.repository);
        tokio::spawn(async move {
            let _guard = lock.lock().await;
            engine.execute(&run, &source_url).await
        })
    }
}

/// One async mutex per repository
#[derive(Debug, Clone, Default)]
pub struct RepoLocks(Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>);

impl RepoLocks {
    pub fn lock_for(&self, repository: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(locks.entry(repository.to_string()).or_default())
    }
}

/// Create the router with all endpoints
pub fn create_router<R: CommandRunner + 'static>(state: AppState<R>, webhook_path: &str) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(webhook_path, post(webhook::receive::<R>))
        .route("/logs/{id}", get(logs::get_log::<R>))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
