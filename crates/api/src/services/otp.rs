//! Password reset by emailed one-time code.
//!
//! Issuing a code deletes every earlier code for the account, so only the
//! newest can ever be redeemed. A code is redeemable while it is
//! [`OtpState::Fresh`]: unused and younger than [`OTP_VALIDITY`]. Every way a
//! redemption can fail produces the same [`ServiceError::VerificationFailed`].
//!
//! Issuing takes at least [`ISSUE_MIN_DURATION`] whether or not the email
//! belongs to an account, so response time does not reveal which it was.
//!
//! [`OTP_VALIDITY`]: secure_commerce_core::OTP_VALIDITY

use std::time::Duration;

use rand::Rng;
use tokio::time::{Instant, sleep_until};

use secure_commerce_core::{Email, OtpCode, OtpState, PasswordError, validate_password};

use super::ServiceError;
use super::auth::hash_password;
use super::clock::Clock;
use super::notifications::{Notification, NotificationDispatcher};
use crate::db::Repositories;

/// Shortest time [`OtpService::issue`] takes for a well-formed email.
pub const ISSUE_MIN_DURATION: Duration = Duration::from_millis(200);

/// Issues and redeems password reset codes.
pub struct OtpService<'a> {
    repos: &'a Repositories,
    notifications: &'a NotificationDispatcher,
    clock: &'a dyn Clock,
}

impl<'a> OtpService<'a> {
    /// Create an OTP service.
    #[must_use]
    pub const fn new(
        repos: &'a Repositories,
        notifications: &'a NotificationDispatcher,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            repos,
            notifications,
            clock,
        }
    }

    /// Issue a new code for `email` and mail it.
    ///
    /// Succeeds identically whether or not an account exists.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Invalid` for a malformed email, or a repository
    /// error if the code cannot be stored.
    pub async fn issue(&self, email: &str) -> Result<(), ServiceError> {
        let email =
            Email::parse(email).map_err(|_| ServiceError::invalid("Invalid email address."))?;

        let deadline = Instant::now() + ISSUE_MIN_DURATION;
        let result = self.issue_for(email).await;
        sleep_until(deadline).await;
        result
    }

    async fn issue_for(&self, email: Email) -> Result<(), ServiceError> {
        let Some(account) = self.repos.accounts.find_by_email(&email).await? else {
            tracing::debug!("reset code requested for unknown email");
            return Ok(());
        };

        let code = generate_code()?;
        self.repos
            .otps
            .replace_for_account(account.id, code, self.clock.now())
            .await?;

        tracing::info!(account_id = %account.id, "reset code issued");
        self.notifications
            .dispatch(Notification::OtpIssued { email, code });
        Ok(())
    }

    /// Redeem a code and set a new password.
    ///
    /// The email, code format and new password are validated first. After
    /// that, an unknown account, a missing code, a wrong code, a used code and
    /// an expired code are indistinguishable to the caller.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Invalid` for malformed input and
    /// `ServiceError::VerificationFailed` for anything that does not verify.
    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        let email =
            Email::parse(email).map_err(|_| ServiceError::invalid("Invalid email address."))?;
        let submitted = OtpCode::parse(code).map_err(|_| ServiceError::invalid("Invalid OTP format."))?;
        validate_password(new_password, email.as_str()).map_err(|e| match e {
            PasswordError::SameAsEmail => {
                ServiceError::invalid("Password cannot be same as the email.")
            }
            _ => ServiceError::invalid("Invalid or weak password."),
        })?;

        let account = self
            .repos
            .accounts
            .find_by_email(&email)
            .await?
            .ok_or(ServiceError::VerificationFailed)?;
        let otp = self
            .repos
            .otps
            .find_for_account(account.id)
            .await?
            .ok_or(ServiceError::VerificationFailed)?;

        let state = otp.state_at(self.clock.now());
        if otp.code != submitted || state != OtpState::Fresh {
            tracing::info!(account_id = %account.id, ?state, "reset code rejected");
            return Err(ServiceError::VerificationFailed);
        }

        let password_hash = hash_password(new_password)?;
        // A redemption that loses the claim to a concurrent one fails here.
        if !self
            .repos
            .otps
            .redeem(otp.id, account.id, &password_hash)
            .await?
        {
            return Err(ServiceError::VerificationFailed);
        }

        tracing::info!(account_id = %account.id, "password reset");
        Ok(())
    }
}

/// Uniform random code in `1000..=9999` from the thread-local CSPRNG.
fn generate_code() -> Result<OtpCode, ServiceError> {
    let value = rand::rng().random_range(OtpCode::MIN..=OtpCode::MAX);
    OtpCode::new(value).map_err(|e| ServiceError::Internal(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeDelta;
    use secure_commerce_core::Role;

    use super::*;
    use crate::services::auth::verify_password;
    use crate::services::testing::Fixture;

    const EMAIL: &str = "reset@example.com";
    const NEW_PASSWORD: &str = "N3wPass!";

    async fn issued_code(fx: &Fixture) -> String {
        fx.otp().issue(EMAIL).await.unwrap();
        let sent = fx.notifier.wait_for(1).await;
        match sent.last() {
            Some(Notification::OtpIssued { code, .. }) => code.to_string(),
            other => panic!("expected OtpIssued, got {other:?}"),
        }
    }

    fn wrong(code: &str) -> String {
        if code == "1000" { "1001" } else { "1000" }.to_owned()
    }

    #[test]
    fn test_generated_codes_stay_in_range() {
        for _ in 0..1000 {
            let code = generate_code().unwrap().value();
            assert!((1000..=9999).contains(&code));
        }
    }

    #[tokio::test]
    async fn test_reset_with_fresh_code() {
        let fx = Fixture::new();
        let account = fx.account(EMAIL, Role::Customer).await;
        let code = issued_code(&fx).await;

        fx.otp().reset_password(EMAIL, &code, NEW_PASSWORD).await.unwrap();

        let updated = fx.repos.accounts.find_by_id(account.id).await.unwrap().unwrap();
        assert!(verify_password(NEW_PASSWORD, &updated.password_hash).is_ok());
        assert!(fx.store.otps_for(account.id).await[0].used);
    }

    #[tokio::test]
    async fn test_failed_password_write_keeps_code_fresh() {
        let fx = Fixture::new();
        let account = fx.account(EMAIL, Role::Customer).await;
        let code = issued_code(&fx).await;

        fx.store.set_fail_password_writes(true);
        assert!(matches!(
            fx.otp().reset_password(EMAIL, &code, NEW_PASSWORD).await,
            Err(ServiceError::Repository(_))
        ));
        assert!(!fx.store.otps_for(account.id).await[0].used);
        let unchanged = fx.repos.accounts.find_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(unchanged.password_hash, account.password_hash);

        fx.store.set_fail_password_writes(false);
        fx.otp().reset_password(EMAIL, &code, NEW_PASSWORD).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_issue_takes_same_minimum_time_for_unknown_email() {
        let fx = Fixture::new();
        fx.account(EMAIL, Role::Customer).await;

        for email in [EMAIL, "ghost@example.com"] {
            let started = Instant::now();
            fx.otp().issue(email).await.unwrap();
            assert!(started.elapsed() >= ISSUE_MIN_DURATION, "{email}");
        }

        let started = Instant::now();
        assert!(fx.otp().issue("nope").await.is_err());
        assert!(started.elapsed() < ISSUE_MIN_DURATION);
    }

    #[tokio::test]
    async fn test_code_is_accepted_only_once() {
        let fx = Fixture::new();
        fx.account(EMAIL, Role::Customer).await;
        let code = issued_code(&fx).await;

        fx.otp().reset_password(EMAIL, &code, NEW_PASSWORD).await.unwrap();
        assert!(matches!(
            fx.otp().reset_password(EMAIL, &code, "An0ther!").await,
            Err(ServiceError::VerificationFailed)
        ));
    }

    #[tokio::test]
    async fn test_code_expires_after_ten_minutes() {
        let fx = Fixture::new();
        let account = fx.account(EMAIL, Role::Customer).await;
        let code = issued_code(&fx).await;

        fx.clock.advance(TimeDelta::minutes(10));
        assert!(matches!(
            fx.otp().reset_password(EMAIL, &code, NEW_PASSWORD).await,
            Err(ServiceError::VerificationFailed)
        ));
        let unchanged = fx.repos.accounts.find_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(unchanged.password_hash, account.password_hash);
        assert!(!fx.store.otps_for(account.id).await[0].used);
    }

    #[tokio::test]
    async fn test_code_is_valid_just_before_expiry() {
        let fx = Fixture::new();
        fx.account(EMAIL, Role::Customer).await;
        let code = issued_code(&fx).await;

        fx.clock.advance(TimeDelta::minutes(10) - TimeDelta::seconds(1));
        fx.otp().reset_password(EMAIL, &code, NEW_PASSWORD).await.unwrap();
    }

    #[tokio::test]
    async fn test_new_code_invalidates_previous() {
        let fx = Fixture::new();
        let account = fx.account(EMAIL, Role::Customer).await;
        let first = issued_code(&fx).await;

        fx.otp().issue(EMAIL).await.unwrap();
        let sent = fx.notifier.wait_for(2).await;
        let Some(Notification::OtpIssued { code: second, .. }) = sent.last() else {
            panic!("expected OtpIssued");
        };

        assert_eq!(fx.store.otps_for(account.id).await.len(), 1);
        if first != second.to_string() {
            assert!(matches!(
                fx.otp().reset_password(EMAIL, &first, NEW_PASSWORD).await,
                Err(ServiceError::VerificationFailed)
            ));
        }
        fx.otp()
            .reset_password(EMAIL, &second.to_string(), NEW_PASSWORD)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_wrong_code_fails_and_leaves_code_usable() {
        let fx = Fixture::new();
        fx.account(EMAIL, Role::Customer).await;
        let code = issued_code(&fx).await;

        assert!(matches!(
            fx.otp().reset_password(EMAIL, &wrong(&code), NEW_PASSWORD).await,
            Err(ServiceError::VerificationFailed)
        ));
        fx.otp().reset_password(EMAIL, &code, NEW_PASSWORD).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_email_is_uniform() {
        let fx = Fixture::new();
        fx.otp().issue("ghost@example.com").await.unwrap();
        assert!(matches!(
            fx.otp()
                .reset_password("ghost@example.com", "1234", NEW_PASSWORD)
                .await,
            Err(ServiceError::VerificationFailed)
        ));
        assert!(fx.notifier.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_input_validation() {
        let fx = Fixture::new();
        assert!(matches!(
            fx.otp().issue("nope").await,
            Err(ServiceError::Invalid(_))
        ));
        for code in ["123", "12345", "abcd", "0123"] {
            assert!(matches!(
                fx.otp().reset_password(EMAIL, code, NEW_PASSWORD).await,
                Err(ServiceError::Invalid(message)) if message == "Invalid OTP format."
            ));
        }
        assert!(matches!(
            fx.otp().reset_password(EMAIL, "1234", "weak").await,
            Err(ServiceError::Invalid(message)) if message == "Invalid or weak password."
        ));
    }
}
