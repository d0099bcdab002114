//! Liveness and health probes.

use crate::state::AppState;
use axum::{http::StatusCode, response::IntoResponse, Json};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Bounded probe. Yields "healthy", "timeout" or "{prefix}: {error}".
async fn run_check<F, E>(timeout: Duration, f: F, error_prefix: &str) -> String
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match tokio::time::timeout(timeout, f).await {
        Ok(Ok(())) => "healthy".to_string(),
        Ok(Err(e)) => format!("{}: {}", error_prefix, e),
        Err(_) => "timeout".to_string(),
    }
}

#[derive(serde::Serialize)]
pub(super) struct HealthCheckResponse {
    pub status: String,
    pub scratch: String,
    /// Files currently held by in-flight requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch_files: Option<usize>,
}

/// The process answers.
pub async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "alive" })),
    )
}

/// Health check: the scratch directory must be writable.
pub async fn health_check(state: Arc<AppState>) -> impl IntoResponse {
    const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

    let scratch = state.scratch.clone();
    let scratch_status = run_check(PROBE_TIMEOUT, async move { scratch.probe().await }, "unhealthy").await;
    let healthy = scratch_status == "healthy";

    let scratch_files = match state.scratch.staged_file_count().await {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to count scratch files");
            None
        }
    };

    let response = HealthCheckResponse {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        scratch: scratch_status,
        scratch_files,
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        tracing::error!(scratch = %response.scratch, "Health check failed");
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}
