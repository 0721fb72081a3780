//! Account roles.

use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned for an integer that names no role.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid user type: {0}")]
pub struct RoleError(pub i16);

/// What an account is allowed to do.
///
/// Serialized as its integer code (`user_type` on the wire and in storage).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum Role {
    /// Browses listings and places orders.
    Customer = 0,
    /// Creates and removes their own listings.
    Seller = 1,
    /// Operator account, created from the CLI only.
    Admin = 2,
}

impl Role {
    /// Integer code stored in the `user_type` column.
    #[must_use]
    pub const fn code(self) -> i16 {
        self as i16
    }

    /// Whether this role may be chosen at signup.
    #[must_use]
    pub const fn is_self_registrable(self) -> bool {
        matches!(self, Self::Customer | Self::Seller)
    }
}

impl TryFrom<i16> for Role {
    type Error = RoleError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Customer),
            1 => Ok(Self::Seller),
            2 => Ok(Self::Admin),
            other => Err(RoleError(other)),
        }
    }
}

impl From<Role> for i16 {
    fn from(role: Role) -> Self {
        role.code()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Seller => write!(f, "seller"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(Role::Customer.code(), 0);
        assert_eq!(Role::Seller.code(), 1);
        assert_eq!(Role::Admin.code(), 2);
        assert_eq!(Role::try_from(1), Ok(Role::Seller));
        assert_eq!(Role::try_from(3), Err(RoleError(3)));
    }

    #[test]
    fn test_self_registration() {
        assert!(Role::Customer.is_self_registrable());
        assert!(Role::Seller.is_self_registrable());
        assert!(!Role::Admin.is_self_registrable());
    }

    #[test]
    fn test_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&Role::Seller).unwrap(), "1");
        let role: Role = serde_json::from_str("0").unwrap();
        assert_eq!(role, Role::Customer);
        assert!(serde_json::from_str::<Role>("7").is_err());
    }
}
