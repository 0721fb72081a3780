//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health              - Liveness check
//! GET    /health/ready        - Readiness check (store reachable)
//!
//! # Accounts
//! POST   /account_exists      - Whether an email is registered
//! POST   /user_signup         - Register a customer or seller          (rate limited)
//! GET    /current_user        - The signed-in account                  (bearer)
//!
//! # Tokens
//! POST   /token               - Email + password -> token pair         (rate limited)
//! POST   /token/refresh       - Refresh token -> access token
//! POST   /user_signout        - Revoke both tokens                     (bearer)
//!
//! # Password reset
//! POST   /generate_otp        - Email a reset code                     (rate limited)
//! POST   /reset_password      - Code + new password                    (rate limited)
//!
//! # Listings
//! GET    /get_all_listings    - Every listing                          (customer)
//! GET    /get_my_listings     - The seller's listings                  (seller)
//! POST   /create_listing      - New listing                            (seller)
//! DELETE /delete_listing      - Remove an owned listing                (seller)
//!
//! # Orders and feedback
//! POST   /place_order         - Check out                              (customer)
//! POST   /feedback            - Leave feedback                         (bearer)
//! ```

pub mod accounts;
pub mod auth;
pub mod feedback;
pub mod health;
pub mod listings;
pub mod orders;
pub mod password_reset;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde_json::json;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::{auth_rate_limiter, request_id_middleware, security_headers_middleware};
use crate::state::AppState;

/// A `{"detail": message}` response with `status`.
pub(crate) fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

/// Routes that accept credentials or reset codes from anonymous clients.
fn credential_routes(rate_limit: bool) -> Router<AppState> {
    let router = Router::new()
        .route("/token", post(auth::obtain))
        .route("/user_signup", post(accounts::signup))
        .route("/generate_otp", post(password_reset::generate_otp))
        .route("/reset_password", post(password_reset::reset_password));

    if rate_limit {
        router.layer(auth_rate_limiter())
    } else {
        router
    }
}

/// Create all API routes.
pub fn routes(rate_limit: bool) -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        // Accounts and tokens
        .route("/account_exists", post(accounts::account_exists))
        .route("/current_user", get(accounts::current_user))
        .route("/token/refresh", post(auth::refresh))
        .route("/user_signout", post(auth::sign_out))
        // Listings
        .route("/get_all_listings", get(listings::all))
        .route("/get_my_listings", get(listings::mine))
        .route("/create_listing", post(listings::create))
        .route("/delete_listing", delete(listings::delete))
        // Orders and feedback
        .route("/place_order", post(orders::place))
        .route("/feedback", post(feedback::submit))
        .merge(credential_routes(rate_limit))
}

/// Build the complete application: routes, middleware and state.
pub fn app(state: AppState, rate_limit: bool) -> Router {
    routes(rate_limit)
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
