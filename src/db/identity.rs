//! Identity model for medgate.
//!
//! This module defines the Identity struct and Role enum for account
//! management.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Account role for permission management.
///
/// The first two successfully created identities become admins; every
/// later identity starts as a guest. Doctor is reachable only through a
/// later role edit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    /// Unprivileged account.
    #[default]
    Guest,
    /// Clinical staff.
    Doctor,
    /// Administrator.
    Admin,
}

impl Role {
    /// Convert role to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::Doctor => "doctor",
            Role::Admin => "admin",
        }
    }

    /// Check if this role grants administrative rights.
    pub fn is_admin(&self) -> bool {
        *self == Role::Admin
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "guest" => Ok(Role::Guest),
            "doctor" => Ok(Role::Doctor),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

/// Identity entity representing a registered account.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Identity {
    /// Unique identity ID.
    pub id: i64,
    /// Login username (unique).
    pub username: String,
    /// Email address (unique, stored lowercase).
    pub email: String,
    /// Password hash (Argon2).
    pub password: String,
    /// Account role.
    pub role: Role,
    /// Whether the email address has been verified.
    pub is_verified: bool,
    /// Pending email-verification code, if any.
    pub verification_code: Option<String>,
    /// Expiry paired with the verification code.
    pub verification_expires_at: Option<String>,
    /// Pending password-reset code, if any.
    pub reset_code: Option<String>,
    /// Expiry paired with the password-reset code.
    pub reset_expires_at: Option<String>,
    /// PIN hash (Argon2); only admins ever hold one.
    pub pin: Option<String>,
    /// Pending PIN-reset code, if any.
    pub pin_reset_code: Option<String>,
    /// Expiry paired with the PIN-reset code.
    pub pin_reset_expires_at: Option<String>,
    /// Account creation timestamp.
    pub created_at: String,
}

impl Identity {
    /// Check if this identity is an administrator.
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Check if this identity holds a configured PIN.
    pub fn has_pin(&self) -> bool {
        self.pin.is_some()
    }
}

/// Data for creating a new identity.
///
/// The role is not part of the request: it is derived by the store from
/// the current identity count at insert time.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    /// Login username.
    pub username: String,
    /// Email address (will be stored lowercase).
    pub email: String,
    /// Password hash (must be pre-hashed with Argon2).
    pub password: String,
}

impl NewIdentity {
    /// Create a new identity request.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}
