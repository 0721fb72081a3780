//! Feedback, health checks and response headers.

#![allow(clippy::unwrap_used)]

use axum::http::{Method, StatusCode};
use serde_json::json;

use secure_commerce_integration_tests::TestApp;

#[tokio::test]
async fn test_feedback_is_stored() {
    let app = TestApp::new();
    let token = app.customer("buyer@example.com").await;

    let response = app
        .post("/feedback", Some(&token), json!({ "feedback": "Fast delivery, thanks." }))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.detail(), "Feedback submitted successfully.");

    let stored = app.store.feedback().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].message, "Fast delivery, thanks.");
}

#[tokio::test]
async fn test_feedback_validation() {
    let app = TestApp::new();
    let token = app.seller("seller@example.com").await;

    let response = app.post("/feedback", Some(&token), json!({})).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.detail(), "Feedback message is required.");

    let response = app.post("/feedback", Some(&token), json!({ "feedback": "x" })).await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .post("/feedback", Some(&token), json!({ "feedback": "y".repeat(1001) }))
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);

    let response = app.post("/feedback", None, json!({ "feedback": "Hello" })).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    assert!(app.store.feedback().await.is_empty());
}

#[tokio::test]
async fn test_health_checks() {
    let app = TestApp::new();

    let response = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app.get("/health/ready", None).await;
    assert_eq!(response.status, StatusCode::OK);

    app.store.set_unavailable(true);
    let response = app.get("/health/ready", None).await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_responses_carry_security_headers() {
    let app = TestApp::new();

    for response in [
        app.get("/health", None).await,
        app.get("/current_user", None).await,
        app.get("/no_such_route", None).await,
    ] {
        let headers = &response.headers;
        assert_eq!(headers["x-frame-options"], "DENY");
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["cache-control"], "no-store, max-age=0");
        assert!(headers.contains_key("x-request-id"));
    }
}
