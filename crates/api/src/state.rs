//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::TokenConfig;
use crate::db::Repositories;
use crate::services::accounts::AccountService;
use crate::services::auth::TokenService;
use crate::services::clock::Clock;
use crate::services::feedback::FeedbackService;
use crate::services::image_probe::ImageProbe;
use crate::services::listings::ListingService;
use crate::services::notifications::NotificationDispatcher;
use crate::services::orders::OrderService;
use crate::services::otp::OtpService;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and hands out the per-request
/// services, each borrowing the collaborators it needs.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    repos: Repositories,
    tokens: TokenService,
    notifications: NotificationDispatcher,
    image_probe: Arc<dyn ImageProbe>,
    clock: Arc<dyn Clock>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `repos` - Storage, `PostgreSQL` or in-memory
    /// * `tokens` - Token signing configuration
    /// * `notifications` - Handle to the background email worker
    /// * `image_probe` - Liveness check for listing images
    /// * `clock` - Time source for token expiry, OTPs and card expiry
    #[must_use]
    pub fn new(
        repos: Repositories,
        tokens: &TokenConfig,
        notifications: NotificationDispatcher,
        image_probe: Arc<dyn ImageProbe>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tokens = TokenService::new(tokens, clock.clone());
        Self {
            inner: Arc::new(AppStateInner {
                repos,
                tokens,
                notifications,
                image_probe,
                clock,
            }),
        }
    }

    /// Get a reference to the repositories.
    #[must_use]
    pub fn repos(&self) -> &Repositories {
        &self.inner.repos
    }

    /// Get a reference to the token service.
    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    #[must_use]
    pub fn accounts(&self) -> AccountService<'_> {
        AccountService::new(&self.inner.repos, &self.inner.tokens, &self.inner.notifications)
    }

    #[must_use]
    pub fn otp(&self) -> OtpService<'_> {
        OtpService::new(
            &self.inner.repos,
            &self.inner.notifications,
            self.inner.clock.as_ref(),
        )
    }

    #[must_use]
    pub fn listings(&self) -> ListingService<'_> {
        ListingService::new(&self.inner.repos, self.inner.image_probe.as_ref())
    }

    #[must_use]
    pub fn orders(&self) -> OrderService<'_> {
        OrderService::new(&self.inner.repos, self.inner.clock.as_ref())
    }

    #[must_use]
    pub fn feedback(&self) -> FeedbackService<'_> {
        FeedbackService::new(&self.inner.repos)
    }
}
