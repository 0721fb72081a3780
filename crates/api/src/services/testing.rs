//! Shared fixtures for service unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::TimeDelta;
use secrecy::SecretString;
use tokio::sync::{Mutex, Notify};

use secure_commerce_core::{Email, ImageUrl, Role};

use super::accounts::AccountService;
use super::auth::{TokenService, hash_password};
use super::clock::ManualClock;
use super::feedback::FeedbackService;
use super::image_probe::ImageProbe;
use super::listings::ListingService;
use super::notifications::{Notification, NotificationDispatcher, NotificationError, Notifier};
use super::orders::OrderService;
use super::otp::OtpService;
use crate::config::TokenConfig;
use crate::db::{AccountRepository, MemoryStore, Repositories};
use crate::models::{Account, NewAccount};

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

/// Image probe with a switchable answer.
pub struct StaticProbe {
    live: AtomicBool,
}

impl StaticProbe {
    pub fn set_live(&self, live: bool) {
        self.live.store(live, Ordering::SeqCst);
    }
}

#[async_trait]
impl ImageProbe for StaticProbe {
    async fn is_live_image(&self, _url: &ImageUrl) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

/// Everything a service needs, over an in-memory store.
pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub repos: Repositories,
    pub clock: Arc<ManualClock>,
    pub tokens: TokenService,
    pub notifier: Arc<RecordingNotifier>,
    pub notifications: NotificationDispatcher,
    pub probe: StaticProbe,
}

impl Fixture {
    /// Must be called inside a Tokio runtime.
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::default());
        let tokens = TokenService::new(
            &TokenConfig {
                secret: SecretString::from("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6"),
                access_ttl: TimeDelta::minutes(30),
                refresh_ttl: TimeDelta::hours(24),
            },
            clock.clone(),
        );
        let notifier = Arc::new(RecordingNotifier::default());

        Self {
            repos: Repositories::memory(store.clone()),
            store,
            clock,
            tokens,
            notifications: NotificationDispatcher::spawn(notifier.clone()),
            notifier,
            probe: StaticProbe {
                live: AtomicBool::new(true),
            },
        }
    }

    /// Store an account directly, with password `Passw0rd!`.
    pub async fn account(&self, email: &str, role: Role) -> Account {
        AccountRepository::create(
            self.store.as_ref(),
            NewAccount {
                email: Email::parse(email).expect("valid email"),
                password_hash: hash_password("Passw0rd!").expect("hash"),
                role,
                first_name: "Test".to_owned(),
                last_name: "User".to_owned(),
            },
        )
        .await
        .expect("account created")
    }

    pub fn accounts(&self) -> AccountService<'_> {
        AccountService::new(&self.repos, &self.tokens, &self.notifications)
    }

    pub fn otp(&self) -> OtpService<'_> {
        OtpService::new(&self.repos, &self.notifications, self.clock.as_ref())
    }

    pub fn listings(&self) -> ListingService<'_> {
        ListingService::new(&self.repos, &self.probe)
    }

    pub fn orders(&self) -> OrderService<'_> {
        OrderService::new(&self.repos, self.clock.as_ref())
    }

    pub fn feedback(&self) -> FeedbackService<'_> {
        FeedbackService::new(&self.repos)
    }
}
