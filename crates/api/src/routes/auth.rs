//! Token route handlers.
//!
//! Bearer tokens come in pairs. The short-lived access token goes in the
//! `Authorization` header. The refresh token is only ever sent to
//! `/token/refresh` and `/user_signout`.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::extract::{ApiJson, Loose, required, text};
use crate::middleware::RequireAuth;
use crate::models::UserRecord;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub email: Option<Loose>,
    pub password: Option<Loose>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access: String,
    pub refresh: String,
    pub user: UserRecord,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: Option<Loose>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access: String,
}

/// POST /token
///
/// Exchange email and password for a token pair.
pub async fn obtain(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<TokenRequest>,
) -> Result<Json<TokenResponse>> {
    let (Some(email), Some(password)) = (text(body.email), text(body.password)) else {
        return Err(AppError::bad_request("Missing required fields."));
    };

    let (account, tokens) = state.accounts().login(&email, &password).await?;
    Ok(Json(TokenResponse {
        access: tokens.access,
        refresh: tokens.refresh,
        user: UserRecord::from(&account),
    }))
}

/// POST /token/refresh
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RefreshRequest>,
) -> Result<Json<RefreshResponse>> {
    let token = required(body.refresh, "Refresh token required.")?;
    let access = state.accounts().refresh(&token).await?;
    Ok(Json(RefreshResponse { access }))
}

/// POST /user_signout
///
/// Revokes both the refresh token in the body and the access token the
/// request was made with. Responds 205 Reset Content.
pub async fn sign_out(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    ApiJson(body): ApiJson<RefreshRequest>,
) -> Result<StatusCode> {
    let token = required(body.refresh, "Refresh token required.")?;
    state.accounts().sign_out(&current.claims, &token).await?;
    Ok(StatusCode::RESET_CONTENT)
}
