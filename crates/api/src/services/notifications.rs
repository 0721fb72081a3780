//! Outbound email, delivered off the request path.
//!
//! Handlers call [`NotificationDispatcher::dispatch`], which queues the message
//! and returns at once. A background task hands each message to a
//! [`Notifier`]; delivery failures are logged and otherwise dropped.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;
use tokio::sync::mpsc;

use secure_commerce_core::{Email, OtpCode};

use crate::config::SmtpConfig;

/// A message for an account holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A password reset code was issued.
    OtpIssued { email: Email, code: OtpCode },
    /// Someone tried to sign up with an email that already has an account.
    AccountExists { email: Email },
}

impl Notification {
    /// Recipient address.
    #[must_use]
    pub const fn recipient(&self) -> &Email {
        match self {
            Self::OtpIssued { email, .. } | Self::AccountExists { email } => email,
        }
    }

    /// Short name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::OtpIssued { .. } => "otp_issued",
            Self::AccountExists { .. } => "account_exists",
        }
    }

    fn subject(&self) -> &'static str {
        match self {
            Self::OtpIssued { .. } => "Your password reset code",
            Self::AccountExists { .. } => "You already have an account",
        }
    }

    fn body(&self) -> String {
        match self {
            Self::OtpIssued { code, .. } => format!(
                "Your password reset code is {code}.\n\n\
                 It expires in 10 minutes. If you did not ask to reset your \
                 password you can ignore this email."
            ),
            Self::AccountExists { .. } => "Someone tried to create a new account with this \
                                            email address, but you already have one.\n\n\
                                            Sign in instead, or reset your password if you \
                                            have forgotten it."
                .to_owned(),
        }
    }
}

/// Errors that can occur when delivering a notification.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

/// Delivers notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notification.
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError>;
}

/// Sends notifications as plain-text email over SMTP.
#[derive(Clone)]
pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    /// Create an SMTP notifier from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay cannot be configured or the sender
    /// address does not parse.
    pub fn new(config: &SmtpConfig) -> Result<Self, NotificationError> {
        let credentials = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_owned(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        let from = config
            .from_address
            .parse()
            .map_err(|_| NotificationError::InvalidAddress(config.from_address.clone()))?;

        Ok(Self { mailer, from })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        let to = notification.recipient();
        let message = Message::builder()
            .from(self.from.clone())
            .to(to
                .as_str()
                .parse()
                .map_err(|_| NotificationError::InvalidAddress(to.to_string()))?)
            .subject(notification.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(notification.body())?;

        self.mailer.send(message).await?;
        Ok(())
    }
}

/// Logs notifications instead of sending them. Used when SMTP is not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        // The code itself stays out of the log.
        tracing::info!(
            kind = notification.kind(),
            to = %notification.recipient(),
            "SMTP not configured, notification not sent"
        );
        Ok(())
    }
}

/// Queue in front of a [`Notifier`], drained by a background task.
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::UnboundedSender<Notification>,
}

impl NotificationDispatcher {
    /// Start the delivery task. Must be called inside a Tokio runtime.
    ///
    /// The task ends once every dispatcher clone has been dropped.
    #[must_use]
    pub fn spawn(notifier: Arc<dyn Notifier>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Notification>();

        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                match notifier.send(&notification).await {
                    Ok(()) => tracing::debug!(kind = notification.kind(), "notification sent"),
                    Err(e) => tracing::error!(
                        kind = notification.kind(),
                        error = %e,
                        "failed to send notification"
                    ),
                }
            }
        });

        Self { tx }
    }

    /// Queue a notification without waiting for delivery.
    pub fn dispatch(&self, notification: Notification) {
        if let Err(e) = self.tx.send(notification) {
            tracing::error!(kind = e.0.kind(), "notification worker has stopped");
        }
    }
}
