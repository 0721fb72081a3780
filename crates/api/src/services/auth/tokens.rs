//! Signed bearer tokens.
//!
//! Tokens are HS256 JWTs. A sign-in issues an access/refresh pair; the access
//! token authorizes API calls and the refresh token only mints new access
//! tokens. Expiry is checked against the injected [`Clock`] rather than the
//! library's own wall-clock check, so tests can move time.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use secure_commerce_core::{AccountId, Role};

use super::AuthError;
use crate::config::TokenConfig;
use crate::db::TokenBlacklist;
use crate::services::clock::Clock;

/// Which half of a token pair a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims carried by every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account ID, as a string per JWT convention.
    pub sub: String,
    pub role: Role,
    pub kind: TokenKind,
    /// Unique token ID, the key for revocation.
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// The account this token was issued to.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if `sub` is not an account ID.
    pub fn account_id(&self) -> Result<AccountId, AuthError> {
        self.sub
            .parse::<i32>()
            .map(AccountId::new)
            .map_err(|_| AuthError::InvalidToken)
    }

    /// When the token stops being accepted.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_default()
    }
}

/// An access token and the refresh token that can renew it.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Issues, verifies and revokes bearer tokens.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: TimeDelta,
    refresh_ttl: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    /// Create a token service from configuration.
    #[must_use]
    pub fn new(config: &TokenConfig, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(config.secret_bytes()),
            decoding: DecodingKey::from_secret(config.secret_bytes()),
            validation,
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
            clock,
        }
    }

    /// Issue a fresh access/refresh pair.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Encoding` if signing fails.
    pub fn issue_pair(&self, account_id: AccountId, role: Role) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access: self.issue(account_id, role, TokenKind::Access)?,
            refresh: self.issue(account_id, role, TokenKind::Refresh)?,
        })
    }

    fn issue(&self, account_id: AccountId, role: Role, kind: TokenKind) -> Result<String, AuthError> {
        let now = self.clock.now();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            sub: account_id.to_string(),
            role,
            kind,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(AuthError::Encoding)
    }

    /// Check signature, kind and expiry. Does not consult the blacklist.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` on any failure.
    pub fn decode(&self, token: &str, kind: TokenKind) -> Result<Claims, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "rejected token");
                AuthError::InvalidToken
            })?
            .claims;

        if claims.kind != kind || claims.exp <= self.clock.now().timestamp() {
            return Err(AuthError::InvalidToken);
        }
        Ok(claims)
    }

    /// Verify an access token, including revocation.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` or `AuthError::TokenRevoked`, or
    /// `AuthError::Repository` if the blacklist cannot be read.
    pub async fn verify_access(
        &self,
        token: &str,
        blacklist: &dyn TokenBlacklist,
    ) -> Result<Claims, AuthError> {
        self.verify(token, TokenKind::Access, blacklist).await
    }

    /// Verify a refresh token, including revocation.
    ///
    /// # Errors
    ///
    /// Same as [`TokenService::verify_access`].
    pub async fn verify_refresh(
        &self,
        token: &str,
        blacklist: &dyn TokenBlacklist,
    ) -> Result<Claims, AuthError> {
        self.verify(token, TokenKind::Refresh, blacklist).await
    }

    async fn verify(
        &self,
        token: &str,
        kind: TokenKind,
        blacklist: &dyn TokenBlacklist,
    ) -> Result<Claims, AuthError> {
        let claims = self.decode(token, kind)?;
        if blacklist.is_revoked(claims.jti).await? {
            return Err(AuthError::TokenRevoked);
        }
        Ok(claims)
    }

    /// Mint a new access token from a valid refresh token.
    ///
    /// # Errors
    ///
    /// Same as [`TokenService::verify_refresh`], plus `AuthError::Encoding`.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        blacklist: &dyn TokenBlacklist,
    ) -> Result<String, AuthError> {
        let claims = self.verify_refresh(refresh_token, blacklist).await?;
        self.issue(claims.account_id()?, claims.role, TokenKind::Access)
    }

    /// Blacklist a token until it would have expired anyway.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the blacklist cannot be written.
    pub async fn revoke(
        &self,
        claims: &Claims,
        blacklist: &dyn TokenBlacklist,
    ) -> Result<(), AuthError> {
        blacklist.revoke(claims.jti, claims.expires_at()).await?;
        Ok(())
    }
}
