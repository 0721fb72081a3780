//! Password reset route handlers.
//!
//! Both endpoints answer the same way whether or not the email belongs to an
//! account.

use axum::{extract::State, http::StatusCode, response::Response};
use serde::Deserialize;

use super::detail;
use crate::error::{AppError, Result};
use crate::extract::{ApiJson, Loose, required, text};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateOtpRequest {
    pub email: Option<Loose>,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: Option<Loose>,
    pub otp: Option<Loose>,
    pub password: Option<Loose>,
}

/// POST /generate_otp
///
/// Issues a new code, replacing any earlier one, and emails it.
pub async fn generate_otp(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<GenerateOtpRequest>,
) -> Result<Response> {
    let email = required(body.email, "Missing 'email' field.")?;
    state.otp().issue(&email).await?;
    Ok(detail(
        StatusCode::CREATED,
        "OTP has been sent if the account exists.",
    ))
}

/// POST /reset_password
pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ResetPasswordRequest>,
) -> Result<Response> {
    let (Some(email), Some(code), Some(password)) =
        (text(body.email), text(body.otp), text(body.password))
    else {
        return Err(AppError::bad_request("Missing required fields."));
    };

    state
        .otp()
        .reset_password(&email, code.trim(), &password)
        .await?;
    Ok(detail(StatusCode::OK, "Password reset successful."))
}
