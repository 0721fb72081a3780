//! Health check handlers.

use axum::{extract::State, http::StatusCode};

use crate::state::AppState;

/// GET /health
///
/// Liveness check. Returns "ok" if the server is running; does not check
/// dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// GET /health/ready
///
/// Readiness check. Returns 503 Service Unavailable if the store is not
/// reachable.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.repos().health.ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
