//! Integration tests for Secure Commerce.
//!
//! Tests build the real router over an in-memory store and drive it
//! in-process, so no database or running server is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p secure-commerce-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `accounts` - Signup, tokens, sign-out
//! - `password_reset` - OTP issue and redeem
//! - `listings` - Seller listings and role gating
//! - `orders` - Order placement and atomicity
//! - `misc` - Feedback, health, headers

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use chrono::TimeDelta;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::sync::{Mutex, Notify};
use tower::ServiceExt;

use secure_commerce_api::config::TokenConfig;
use secure_commerce_api::db::{MemoryStore, Repositories};
use secure_commerce_api::routes;
use secure_commerce_api::services::clock::ManualClock;
use secure_commerce_api::services::image_probe::ImageProbe;
use secure_commerce_api::services::notifications::{
    Notification, NotificationDispatcher, NotificationError, Notifier,
};
use secure_commerce_api::state::AppState;
use secure_commerce_core::{ImageUrl, OtpCode};

/// Password used by [`TestApp::signup`].
pub const PASSWORD: &str = "Passw0rd!";

/// Records every notification it is handed.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    arrived: Notify,
}

impl RecordingNotifier {
    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }

    /// Wait until at least `count` notifications have arrived.
    pub async fn wait_for(&self, count: usize) -> Vec<Notification> {
        let wait = async {
            loop {
                let arrived = self.arrived.notified();
                let sent = self.sent().await;
                if sent.len() >= count {
                    return sent;
                }
                arrived.await;
            }
        };
        tokio::time::timeout(Duration::from_secs(2), wait)
            .await
            .expect("notifications did not arrive")
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        self.sent.lock().await.push(notification.clone());
        self.arrived.notify_waiters();
        Ok(())
    }
}

/// Image probe that answers from a flag instead of the network.
pub struct FakeProbe {
    live: AtomicBool,
}

impl FakeProbe {
    pub fn set_live(&self, live: bool) {
        self.live.store(live, Ordering::SeqCst);
    }
}

#[async_trait]
impl ImageProbe for FakeProbe {
    async fn is_live_image(&self, _url: &ImageUrl) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

/// A response, with the JSON body parsed (`Null` when empty or not JSON).
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// The `detail` message of the body.
    pub fn detail(&self) -> &str {
        self.body["detail"].as_str().unwrap_or_default()
    }
}

/// The full application over an in-memory store.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub probe: Arc<FakeProbe>,
}

impl TestApp {
    /// Must be called inside a Tokio runtime. Rate limiting is off.
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let probe = Arc::new(FakeProbe {
            live: AtomicBool::new(true),
        });

        let state = AppState::new(
            Repositories::memory(store.clone()),
            &TokenConfig {
                secret: SecretString::from("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6"),
                access_ttl: TimeDelta::minutes(30),
                refresh_ttl: TimeDelta::hours(24),
            },
            NotificationDispatcher::spawn(notifier.clone()),
            probe.clone(),
            clock.clone(),
        );

        Self {
            router: routes::app(state, false),
            store,
            clock,
            notifier,
            probe,
        }
    }

    /// Send one request. `token` becomes a bearer `Authorization` header.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        TestResponse {
            status,
            headers,
            body: serde_json::from_slice(&bytes).unwrap_or(Value::Null),
        }
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::GET, uri, token, None).await
    }

    /// Register an account with [`PASSWORD`] and return its access token.
    ///
    /// `user_type` is `0` for a customer and `1` for a seller.
    pub async fn signup(&self, email: &str, user_type: u8) -> String {
        let response = self
            .post(
                "/user_signup",
                None,
                json!({
                    "email": email,
                    "password": PASSWORD,
                    "first_name": "Test",
                    "last_name": "User",
                    "user_type": user_type,
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        response.body["token"]["access"]
            .as_str()
            .unwrap()
            .to_owned()
    }

    pub async fn customer(&self, email: &str) -> String {
        self.signup(email, 0).await
    }

    pub async fn seller(&self, email: &str) -> String {
        self.signup(email, 1).await
    }

    /// Create a listing as `seller` and return its id.
    pub async fn listing(&self, seller: &str, name: &str, price: i64) -> i64 {
        let response = self
            .post(
                "/create_listing",
                Some(seller),
                json!({
                    "name": name,
                    "price": price,
                    "imageUrl": "https://cdn.example.com/widget.png",
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        response.body["id"].as_i64().unwrap()
    }

    /// The code from the most recent OTP email to `email`.
    pub async fn latest_otp(&self, email: &str, expected_notifications: usize) -> OtpCode {
        self.notifier
            .wait_for(expected_notifications)
            .await
            .into_iter()
            .rev()
            .find_map(|notification| match notification {
                Notification::OtpIssued { email: to, code } if to.as_str() == email => Some(code),
                _ => None,
            })
            .expect("no OTP was sent")
    }
}

/// A checkout body for `items`, with every other field valid.
pub fn checkout(items: Value) -> Value {
    json!({
        "address": "12 Main St, Ottawa",
        "zip": "K1A 0B1",
        "phone": "6139954422",
        "card": "4111111111111111",
        "exp": "12/99",
        "csc": "123",
        "items": items,
    })
}
