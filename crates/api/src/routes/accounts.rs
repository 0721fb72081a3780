//! Account route handlers.
//!
//! Signup, the account-exists probe and the signed-in user's record.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use super::detail;
use crate::error::Result;
use crate::extract::{ApiJson, Loose, required, text};
use crate::middleware::RequireAuth;
use crate::models::UserRecord;
use crate::services::accounts::{SignupInput, SignupOutcome};
use crate::services::auth::TokenPair;
use crate::state::AppState;

// =============================================================================
// Request / Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct AccountExistsRequest {
    pub email: Option<Loose>,
}

#[derive(Debug, Serialize)]
pub struct AccountExistsResponse {
    pub exists: bool,
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: Option<Loose>,
    pub password: Option<Loose>,
    pub first_name: Option<Loose>,
    pub last_name: Option<Loose>,
    pub user_type: Option<Loose>,
}

impl SignupRequest {
    /// Presence is checked field by field, so the client learns which one
    /// is missing.
    fn into_input(self) -> Result<SignupInput> {
        Ok(SignupInput {
            email: required(self.email, "Missing 'email' field.")?,
            password: required(self.password, "Missing 'password' field.")?,
            first_name: required(self.first_name, "Missing 'first_name' field.")?,
            last_name: required(self.last_name, "Missing 'last_name' field.")?,
            user_type: required(self.user_type, "Missing 'user_type' field.")?,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub detail: &'static str,
    pub token: TokenPair,
    pub user: UserRecord,
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /account_exists
///
/// A missing or malformed email simply does not exist.
pub async fn account_exists(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<AccountExistsRequest>,
) -> Result<Json<AccountExistsResponse>> {
    let exists = match text(body.email) {
        Some(email) => state.accounts().account_exists(&email).await?,
        None => false,
    };
    Ok(Json(AccountExistsResponse { exists }))
}

/// POST /user_signup
///
/// Returns 201 with a token pair for a new account, or 202 when the email is
/// already registered (the owner is told by email instead).
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SignupRequest>,
) -> Result<Response> {
    let input = body.into_input()?;

    let response = match state.accounts().signup(input).await? {
        SignupOutcome::Created { account, tokens } => (
            StatusCode::CREATED,
            Json(SignupResponse {
                detail: "Registration successful.",
                token: tokens,
                user: UserRecord::from(&account),
            }),
        )
            .into_response(),
        SignupOutcome::AlreadyExists => detail(
            StatusCode::ACCEPTED,
            "We have sent you a confirmation email to complete registration.",
        ),
    };
    Ok(response)
}

/// GET /current_user
pub async fn current_user(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<UserRecord>> {
    let account = state.accounts().current_user(current.id).await?;
    Ok(Json(UserRecord::from(&account)))
}
