//! Feedback route handler.

use axum::{extract::State, http::StatusCode, response::Response};
use serde::Deserialize;

use super::detail;
use crate::error::Result;
use crate::extract::{ApiJson, Loose, text};
use crate::middleware::RequireAuth;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub feedback: Option<Loose>,
}

/// POST /feedback
pub async fn submit(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    ApiJson(body): ApiJson<FeedbackRequest>,
) -> Result<Response> {
    let message = text(body.feedback).unwrap_or_default();
    state.feedback().submit(current.id, &message).await?;
    Ok(detail(StatusCode::CREATED, "Feedback submitted successfully."))
}
