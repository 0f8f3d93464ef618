//! Status reporter - mirrors run progress into remote status checks
//!
//! Reporting is a best-effort side channel. `report` only enqueues an update;
//! a single worker task delivers updates in order with a bounded retry
//! policy. Delivery failures are logged and never reach the executor.

pub mod client;

pub use client::{GitHubStatusClient, LogOnlySink, ReportingError, StatusSink};

use crate::core::{RunContext, StatusState};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Status services reject longer descriptions
pub const MAX_DESCRIPTION_LEN: usize = 140;

/// One status check update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    /// Repository in `owner/name` form
    pub repository: String,
    pub commit_sha: String,
    pub state: StatusState,
    pub context: String,
    pub description: String,
    pub target_url: String,
}

/// Retry policy for delivering a single update
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Delay before retry `n` is `n * backoff`
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

enum Message {
    Deliver(StatusUpdate),
    Flush(oneshot::Sender<()>),
}

/// Handle used by the executor to publish status transitions
#[derive(Debug, Clone)]
pub struct StatusReporter {
    tx: mpsc::UnboundedSender<Message>,
    public_url: Arc<str>,
}

impl StatusReporter {
    /// Start the delivery worker on the current runtime
    ///
    /// `public_url` is the externally reachable base URL of this service; log
    /// links in status checks point below it.
    pub fn spawn<S>(sink: S, public_url: impl Into<String>, policy: RetryPolicy) -> Self
    where
        S: StatusSink + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(deliver_loop(sink, rx, policy));

        let public_url: String = public_url.into();
        Self {
            tx,
            public_url: public_url.trim_end_matches('/').into(),
        }
    }

    /// Link to the run's log artifact
    pub fn target_url(&self, run: &RunContext) -> String {
        format!("{}/logs/{}", self.public_url, run.log_artifact_id)
    }

    /// Queue one status update for `context`
    pub fn report(&self, run: &RunContext, context: &str, state: StatusState) {
        let update = StatusUpdate {
            repository: run.repository.clone(),
            commit_sha: run.commit_sha.clone(),
            state,
            context: context.to_string(),
            description: describe(Utc::now(), context, state),
            target_url: self.target_url(run),
        };

        if self.tx.send(Message::Deliver(update)).is_err() {
            warn!("Status worker stopped; dropping {} update for {}", state, context);
        }
    }

    /// Queue `state` for `<stage_prefix>-<name>` of every name, in order
    pub fn report_batch(
        &self,
        run: &RunContext,
        stage_prefix: &str,
        state: StatusState,
        step_names: &[String],
    ) {
        for name in step_names {
            self.report(run, &format!("{}-{}", stage_prefix, name), state);
        }
    }

    /// Wait until every update queued so far has been handled
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Message::Flush(ack)).is_err() {
            return;
        }
        let _ = done.await;
    }
}

/// Build a status description: `<timestamp> - <context> task <phrase>`
pub fn describe(at: DateTime<Utc>, context: &str, state: StatusState) -> String {
    let description = format!(
        "{} - {} task {}",
        at.format("%Y-%m-%d %H:%M:%S"),
        context,
        state.phrase()
    );
    if description.chars().count() <= MAX_DESCRIPTION_LEN {
        return description;
    }
    let mut truncated: String = description.chars().take(MAX_DESCRIPTION_LEN - 3).collect();
    truncated.push_str("...");
    truncated
}

async fn deliver_loop<S: StatusSink>(
    sink: S,
    mut rx: mpsc::UnboundedReceiver<Message>,
    policy: RetryPolicy,
) {
    while let Some(message) = rx.recv().await {
        match message {
            Message::Deliver(update) => deliver(&sink, &update, policy).await,
            Message::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!("Status worker finished");
}

async fn deliver<S: StatusSink>(sink: &S, update: &StatusUpdate, policy: RetryPolicy) {
    let attempts = policy.attempts.max(1);
    for attempt in 1..=attempts {
        match sink.send(update).await {
            Ok(()) => {
                debug!("Reported {} for {}", update.state, update.context);
                return;
            }
            Err(e) if attempt < attempts => {
                warn!(
                    "Status update {} for {} failed (attempt {}/{}): {}",
                    update.state, update.context, attempt, attempts, e
                );
                tokio::time::sleep(policy.backoff * attempt).await;
            }
            Err(e) => {
                warn!(
                    "Giving up on status update {} for {}: {}",
                    update.state, update.context, e
                );
            }
        }
    }
}
