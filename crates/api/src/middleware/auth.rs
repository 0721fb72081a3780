//! Authentication middleware and extractors.
//!
//! Provides extractors for requiring a bearer token in route handlers, and
//! role-gated variants for customer-only and seller-only endpoints.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use secure_commerce_core::{AccountId, Role};

use crate::error::{AppError, set_sentry_user};
use crate::services::auth::{AuthError, Claims};
use crate::state::AppState;

/// The account behind a verified access token.
#[derive(Debug, Clone)]
pub struct CurrentAccount {
    pub id: AccountId,
    pub role: Role,
    /// Claims of the access token, kept for sign-out.
    pub claims: Claims,
}

/// Extractor that requires a valid, unrevoked access token.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(account): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, account {}!", account.id)
/// }
/// ```
pub struct RequireAuth(pub CurrentAccount);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AuthError::MissingToken)?;
        let claims = state
            .tokens()
            .verify_access(token, state.repos().blacklist.as_ref())
            .await?;
        let id = claims.account_id()?;

        set_sentry_user(&id);
        Ok(Self(CurrentAccount {
            id,
            role: claims.role,
            claims,
        }))
    }
}

/// Extractor for endpoints only customers may use.
pub struct RequireCustomer(pub CurrentAccount);

impl FromRequestParts<AppState> for RequireCustomer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(account) = RequireAuth::from_request_parts(parts, state).await?;
        require_role(account, Role::Customer).map(Self)
    }
}

/// Extractor for endpoints only sellers may use.
pub struct RequireSeller(pub CurrentAccount);

impl FromRequestParts<AppState> for RequireSeller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(account) = RequireAuth::from_request_parts(parts, state).await?;
        require_role(account, Role::Seller).map(Self)
    }
}

/// Pass `account` through if it has `role`.
///
/// # Errors
///
/// Returns `AppError::Forbidden` for any other role.
pub fn require_role(account: CurrentAccount, role: Role) -> Result<CurrentAccount, AppError> {
    if account.role == role {
        Ok(account)
    } else {
        tracing::info!(
            account_id = %account.id,
            role = %account.role,
            required = %role,
            "role check failed"
        );
        Err(AppError::Forbidden)
    }
}

/// The token from an `Authorization: Bearer <token>` header.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;
    use uuid::Uuid;

    use super::*;
    use crate::services::auth::TokenKind;

    fn parts(authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/current_user");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn account(role: Role) -> CurrentAccount {
        CurrentAccount {
            id: AccountId::new(1),
            role,
            claims: Claims {
                sub: "1".to_owned(),
                role,
                kind: TokenKind::Access,
                jti: Uuid::new_v4(),
                iat: 0,
                exp: 60,
            },
        }
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc.def"))), Some("abc.def"));
        assert_eq!(bearer_token(&parts(Some("bearer abc"))), Some("abc"));
        assert_eq!(bearer_token(&parts(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&parts(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts(None)), None);
    }

    #[test]
    fn test_require_role() {
        assert!(require_role(account(Role::Seller), Role::Seller).is_ok());
        assert!(matches!(
            require_role(account(Role::Customer), Role::Seller),
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            require_role(account(Role::Admin), Role::Customer),
            Err(AppError::Forbidden)
        ));
    }
}
