//! Secure Commerce API - accounts, password reset, listings and orders.
//!
//! # Architecture
//!
//! - Axum JSON API with bearer-token (JWT) authentication
//! - `PostgreSQL` storage behind repository traits, or process memory for
//!   local development (`SHOP_IN_MEMORY=1`)
//! - Outgoing email (OTP codes, duplicate signup notices) sent from a
//!   background task so a slow mail server never blocks a request
//!
//! # Security
//!
//! - Passwords hashed with Argon2id
//! - Signed-out tokens are blacklisted until they expire
//! - Sign-in, signup and password reset are rate limited per client IP

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::sync::Arc;

use secure_commerce_api::config::{ApiConfig, StorageConfig};
use secure_commerce_api::db::{self, MemoryStore, Repositories};
use secure_commerce_api::routes;
use secure_commerce_api::services::clock::SystemClock;
use secure_commerce_api::services::image_probe::HttpImageProbe;
use secure_commerce_api::services::notifications::{
    LogNotifier, NotificationDispatcher, Notifier, SmtpNotifier,
};
use secure_commerce_api::state::AppState;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ApiConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            traces_sample_rate: config.sentry_traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Open the configured store.
async fn open_repositories(storage: &StorageConfig) -> Repositories {
    match storage {
        StorageConfig::Postgres { database_url } => {
            let pool = db::create_pool(database_url)
                .await
                .expect("Failed to create database pool");
            tracing::info!("Database pool created");
            // NOTE: Migrations are NOT run automatically on startup.
            // Run them explicitly via: cargo run -p secure-commerce-cli -- migrate
            Repositories::postgres(pool)
        }
        StorageConfig::InMemory => {
            tracing::warn!("Using in-memory storage; all data is lost on exit");
            Repositories::memory(Arc::new(MemoryStore::new()))
        }
    }
}

fn notifier(config: &ApiConfig) -> Arc<dyn Notifier> {
    match &config.smtp {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, "Sending email over SMTP");
            Arc::new(SmtpNotifier::new(smtp).expect("Failed to configure SMTP transport"))
        }
        None => {
            tracing::warn!("SMTP_HOST not set; notifications will only be logged");
            Arc::new(LogNotifier)
        }
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = ApiConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "secure_commerce_api=info,tower_http=debug".into());

    let json_layer = config
        .log_json
        .then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!config.log_json).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let repos = open_repositories(&config.storage).await;
    let notifications = NotificationDispatcher::spawn(notifier(&config));
    let image_probe = HttpImageProbe::new(config.image_check_timeout)
        .expect("Failed to build image probe HTTP client");

    let state = AppState::new(
        repos,
        &config.tokens,
        notifications,
        Arc::new(image_probe),
        Arc::new(SystemClock),
    );

    if !config.rate_limit {
        tracing::warn!("Rate limiting disabled");
    }
    let app = routes::app(state, config.rate_limit);

    // Start server
    let addr = config.socket_addr();
    tracing::info!("api listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    // Peer addresses are the rate-limit key when no proxy header is present
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
