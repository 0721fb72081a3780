//! Signup, sign-in and session tokens.

use secure_commerce_core::{
    AccountId, Email, PasswordError, Role, clean_text, validate_password,
};

use super::ServiceError;
use super::auth::{AuthError, Claims, TokenPair, TokenService, hash_password, verify_password};
use super::notifications::{Notification, NotificationDispatcher};
use crate::db::{RepositoryError, Repositories};
use crate::models::{Account, NewAccount};

const NAME_MIN: usize = 2;
const NAME_MAX: usize = 40;

/// Raw signup fields, already checked for presence.
#[derive(Debug, Clone)]
pub struct SignupInput {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    /// Role code as sent by the client.
    pub user_type: String,
}

/// What a signup attempt did.
#[derive(Debug)]
pub enum SignupOutcome {
    /// A new account was created and signed in.
    Created { account: Account, tokens: TokenPair },
    /// The email was already registered; the owner has been told by email.
    AlreadyExists,
}

/// Account lifecycle operations.
pub struct AccountService<'a> {
    repos: &'a Repositories,
    tokens: &'a TokenService,
    notifications: &'a NotificationDispatcher,
}

impl<'a> AccountService<'a> {
    /// Create an account service.
    #[must_use]
    pub const fn new(
        repos: &'a Repositories,
        tokens: &'a TokenService,
        notifications: &'a NotificationDispatcher,
    ) -> Self {
        Self {
            repos,
            tokens,
            notifications,
        }
    }

    /// Register a new customer or seller.
    ///
    /// Fields are checked in order (email, password, names, role) and the
    /// first failure is reported. An email that is already registered is not
    /// an error: once the email itself is well formed, the owner gets a notice
    /// and the caller learns only that an email was sent.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Invalid` for out-of-policy fields, or a
    /// repository/auth error if persistence or token signing fails.
    pub async fn signup(&self, input: SignupInput) -> Result<SignupOutcome, ServiceError> {
        let email =
            Email::parse(&input.email).map_err(|_| ServiceError::invalid("Invalid email address."))?;

        if self.repos.accounts.exists(&email).await? {
            return Ok(self.already_exists(email));
        }

        validate_password(&input.password, email.as_str()).map_err(|e| match e {
            PasswordError::SameAsEmail => {
                ServiceError::invalid("Password cannot be same as the email.")
            }
            _ => ServiceError::invalid("Invalid or weak password."),
        })?;

        let first_name = clean_text(&input.first_name, NAME_MIN, NAME_MAX, "first name").map_err(
            |_| ServiceError::invalid("First name must be 2-40 characters with no invalid characters."),
        )?;
        let last_name = clean_text(&input.last_name, NAME_MIN, NAME_MAX, "last name").map_err(
            |_| ServiceError::invalid("Last name must be 2-40 characters with no invalid characters."),
        )?;

        let role = parse_role(&input.user_type)
            .ok_or_else(|| ServiceError::invalid("Invalid user type."))?;

        let password_hash = hash_password(&input.password)?;
        let account = match self
            .repos
            .accounts
            .create(NewAccount {
                email: email.clone(),
                password_hash,
                role,
                first_name,
                last_name,
            })
            .await
        {
            Ok(account) => account,
            // Lost a race with a concurrent signup for the same email.
            Err(RepositoryError::Conflict(_)) => return Ok(self.already_exists(email)),
            Err(e) => return Err(e.into()),
        };

        let tokens = self.tokens.issue_pair(account.id, account.role)?;
        tracing::info!(account_id = %account.id, role = %account.role, "account created");
        Ok(SignupOutcome::Created { account, tokens })
    }

    fn already_exists(&self, email: Email) -> SignupOutcome {
        tracing::info!("signup attempted for an existing account");
        self.notifications
            .dispatch(Notification::AccountExists { email });
        SignupOutcome::AlreadyExists
    }

    /// Exchange email and password for a token pair.
    ///
    /// Unknown emails, wrong passwords and inactive accounts all fail the
    /// same way.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` (wrapped) on any mismatch.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(Account, TokenPair), ServiceError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;
        let account = self
            .repos
            .accounts
            .find_by_email(&email)
            .await?
            .filter(|account| account.is_active)
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &account.password_hash)?;

        let tokens = self.tokens.issue_pair(account.id, account.role)?;
        tracing::info!(account_id = %account.id, "signed in");
        Ok((account, tokens))
    }

    /// Whether an account exists for `email`. Malformed emails never do.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the lookup fails.
    pub async fn account_exists(&self, email: &str) -> Result<bool, ServiceError> {
        let Ok(email) = Email::parse(email) else {
            return Ok(false);
        };
        Ok(self.repos.accounts.exists(&email).await?)
    }

    /// The signed-in account's record.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the account no longer exists, or
    /// `ServiceError::Failed` if the lookup fails.
    pub async fn current_user(&self, id: AccountId) -> Result<Account, ServiceError> {
        self.repos
            .accounts
            .find_by_id(id)
            .await
            .map_err(ServiceError::failed("Failed to fetch user data."))?
            .ok_or_else(|| AuthError::InvalidToken.into())
    }

    /// Mint a new access token.
    ///
    /// # Errors
    ///
    /// Returns an auth error if the refresh token is invalid or revoked.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, ServiceError> {
        Ok(self
            .tokens
            .refresh(refresh_token, self.repos.blacklist.as_ref())
            .await?)
    }

    /// Revoke the caller's refresh token and the access token they signed
    /// out with.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::BadRequest` if the refresh token is invalid,
    /// revoked, or belongs to another account.
    pub async fn sign_out(&self, access: &Claims, refresh_token: &str) -> Result<(), ServiceError> {
        let blacklist = self.repos.blacklist.as_ref();
        let refresh = match self.tokens.verify_refresh(refresh_token, blacklist).await {
            Ok(claims) if claims.sub == access.sub => claims,
            Ok(_) | Err(AuthError::InvalidToken | AuthError::TokenRevoked) => {
                return Err(ServiceError::bad_request("Invalid or expired refresh token."));
            }
            Err(e) => return Err(e.into()),
        };

        self.tokens.revoke(&refresh, blacklist).await?;
        self.tokens.revoke(access, blacklist).await?;
        tracing::info!(account_id = %access.sub, "signed out");
        Ok(())
    }
}

/// Parse a self-registrable role from its integer code.
fn parse_role(code: &str) -> Option<Role> {
    code.trim()
        .parse::<i16>()
        .ok()
        .and_then(|code| Role::try_from(code).ok())
        .filter(|role| role.is_self_registrable())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::auth::TokenKind;
    use crate::services::testing::Fixture;

    fn input(email: &str, password: &str) -> SignupInput {
        SignupInput {
            email: email.to_owned(),
            password: password.to_owned(),
            first_name: "Jo".to_owned(),
            last_name: "Li".to_owned(),
            user_type: "0".to_owned(),
        }
    }

    fn invalid_message(result: Result<SignupOutcome, ServiceError>) -> String {
        match result {
            Err(ServiceError::Invalid(message)) => message,
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_signup_creates_account_with_hashed_password() {
        let fx = Fixture::new();
        let outcome = fx.accounts().signup(input("a@b.com", "Aa1!aa")).await.unwrap();

        let SignupOutcome::Created { account, tokens } = outcome else {
            panic!("expected Created");
        };
        assert_eq!(account.role, Role::Customer);
        assert_ne!(account.password_hash, "Aa1!aa");
        assert!(verify_password("Aa1!aa", &account.password_hash).is_ok());
        assert!(fx.tokens.decode(&tokens.access, TokenKind::Access).is_ok());
    }

    #[tokio::test]
    async fn test_signup_existing_email_notifies_owner() {
        let fx = Fixture::new();
        fx.accounts().signup(input("a@b.com", "Aa1!aa")).await.unwrap();
        let outcome = fx.accounts().signup(input("a@b.com", "Bb2@bb")).await.unwrap();

        assert!(matches!(outcome, SignupOutcome::AlreadyExists));
        let sent = fx.notifier.wait_for(1).await;
        assert_eq!(
            sent,
            vec![Notification::AccountExists {
                email: Email::parse("a@b.com").unwrap()
            }]
        );
    }

    #[tokio::test]
    async fn test_signup_validation_messages() {
        let fx = Fixture::new();
        let accounts = fx.accounts();

        assert_eq!(
            invalid_message(accounts.signup(input("not-an-email", "Aa1!aa")).await),
            "Invalid email address."
        );
        assert_eq!(
            invalid_message(accounts.signup(input("a@b.com", "password")).await),
            "Invalid or weak password."
        );

        let mut bad_name = input("a@b.com", "Aa1!aa");
        bad_name.first_name = "<b>Jo</b>".to_owned();
        assert_eq!(
            invalid_message(accounts.signup(bad_name).await),
            "First name must be 2-40 characters with no invalid characters."
        );

        let mut admin = input("a@b.com", "Aa1!aa");
        admin.user_type = "2".to_owned();
        assert_eq!(invalid_message(accounts.signup(admin).await), "Invalid user type.");

        let mut junk_role = input("a@b.com", "Aa1!aa");
        junk_role.user_type = "seller".to_owned();
        assert_eq!(
            invalid_message(accounts.signup(junk_role).await),
            "Invalid user type."
        );
    }

    #[tokio::test]
    async fn test_login_uniform_failures() {
        let fx = Fixture::new();
        fx.accounts().signup(input("a@b.com", "Aa1!aa")).await.unwrap();

        assert!(fx.accounts().login("a@b.com", "Aa1!aa").await.is_ok());
        for (email, password) in [("a@b.com", "Wrong1!"), ("x@y.com", "Aa1!aa"), ("bad", "x")] {
            assert!(matches!(
                fx.accounts().login(email, password).await,
                Err(ServiceError::Auth(AuthError::InvalidCredentials))
            ));
        }
    }

    #[tokio::test]
    async fn test_account_exists() {
        let fx = Fixture::new();
        fx.accounts().signup(input("a@b.com", "Aa1!aa")).await.unwrap();

        assert!(fx.accounts().account_exists("a@b.com").await.unwrap());
        assert!(!fx.accounts().account_exists("c@d.com").await.unwrap());
        assert!(!fx.accounts().account_exists("<script>").await.unwrap());
    }

    #[tokio::test]
    async fn test_sign_out_revokes_both_tokens() {
        let fx = Fixture::new();
        let SignupOutcome::Created { tokens, .. } =
            fx.accounts().signup(input("a@b.com", "Aa1!aa")).await.unwrap()
        else {
            panic!("expected Created");
        };
        let blacklist = fx.repos.blacklist.as_ref();
        let access = fx.tokens.verify_access(&tokens.access, blacklist).await.unwrap();

        fx.accounts().sign_out(&access, &tokens.refresh).await.unwrap();

        assert!(fx.tokens.verify_access(&tokens.access, blacklist).await.is_err());
        assert!(fx.accounts().refresh(&tokens.refresh).await.is_err());
        assert!(matches!(
            fx.accounts().sign_out(&access, &tokens.refresh).await,
            Err(ServiceError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_sign_out_rejects_another_accounts_refresh_token() {
        let fx = Fixture::new();
        let SignupOutcome::Created { tokens: mine, .. } =
            fx.accounts().signup(input("a@b.com", "Aa1!aa")).await.unwrap()
        else {
            panic!("expected Created");
        };
        let SignupOutcome::Created { tokens: theirs, .. } =
            fx.accounts().signup(input("c@d.com", "Aa1!aa")).await.unwrap()
        else {
            panic!("expected Created");
        };
        let access = fx
            .tokens
            .verify_access(&mine.access, fx.repos.blacklist.as_ref())
            .await
            .unwrap();

        assert!(matches!(
            fx.accounts().sign_out(&access, &theirs.refresh).await,
            Err(ServiceError::BadRequest(_))
        ));
    }
}
