//! Log artifact retrieval

use crate::{
    core::LogArtifactId,
    execution::{CommandRunner, RunLog},
    server::{
        error::{ApiError, ApiResult},
        AppState,
    },
};
use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};

/// GET /logs/{id}
/// Serve the log of one run as plain text
pub async fn get_log<R: CommandRunner + 'static>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let artifact = LogArtifactId::parse(&id)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid log artifact id: {}", id)))?;
    tracing::debug!("Reading log artifact {}", artifact);

    let content = RunLog::read_artifact(state.engine.log_dir(), &artifact)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ApiError::NotFound(format!("Log {} not found", artifact)),
            _ => ApiError::InternalError(format!("Failed to read log {}: {}", artifact, e)),
        })?;

    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], content))
}
