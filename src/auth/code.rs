//! One-time code issuing and validation for medgate.
//!
//! Codes are short-lived six-digit numbers proving control of an email
//! address (verification, password reset) or administrative intent
//! (PIN reset). Each flow holds at most one pending code per identity;
//! issuing again overwrites the previous one.

use std::fmt;

use chrono::Duration;
use rand::Rng;
use tracing::debug;

use crate::datetime::expiry_timestamp;
use crate::db::IdentityRepository;
use crate::{AuthError, Result};

/// Lowest issued code value. Codes never have a leading zero.
pub const CODE_MIN: u32 = 100_000;

/// Highest issued code value.
pub const CODE_MAX: u32 = 999_999;

/// The three one-time code flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeFlow {
    /// Prove control of the registered email address.
    EmailVerification,
    /// Authorize a password replacement.
    PasswordReset,
    /// Authorize a PIN replacement (admins only).
    PinReset,
}

impl CodeFlow {
    /// Convert to string representation (used in logs and notifications).
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeFlow::EmailVerification => "email-verification",
            CodeFlow::PasswordReset => "password-reset",
            CodeFlow::PinReset => "pin-reset",
        }
    }

    /// Validity window for codes issued under this flow.
    pub fn window(&self) -> Duration {
        match self {
            CodeFlow::EmailVerification => Duration::minutes(10),
            CodeFlow::PasswordReset => Duration::minutes(10),
            CodeFlow::PinReset => Duration::minutes(30),
        }
    }

    /// Column holding the pending code for this flow.
    pub(crate) fn code_column(&self) -> &'static str {
        match self {
            CodeFlow::EmailVerification => "verification_code",
            CodeFlow::PasswordReset => "reset_code",
            CodeFlow::PinReset => "pin_reset_code",
        }
    }

    /// Column holding the expiry paired with the code.
    pub(crate) fn expiry_column(&self) -> &'static str {
        match self {
            CodeFlow::EmailVerification => "verification_expires_at",
            CodeFlow::PasswordReset => "reset_expires_at",
            CodeFlow::PinReset => "pin_reset_expires_at",
        }
    }
}

impl fmt::Display for CodeFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Generate a uniformly random six-digit code.
///
/// The range is fixed at [100000, 999999]: always exactly six digits,
/// never a leading zero, which fixed-width code entry downstream relies
/// on.
pub fn generate_code() -> String {
    let mut rng = rand::rng();
    rng.random_range(CODE_MIN..=CODE_MAX).to_string()
}

/// Issue a fresh code for the given flow and identity.
///
/// Writes the code and its expiry together, overwriting any pending code
/// for the flow. Returns the code so the caller can hand it to the
/// notification channel.
pub async fn issue(repo: &IdentityRepository<'_>, flow: CodeFlow, id: i64) -> Result<String> {
    let code = generate_code();
    let expires_at = expiry_timestamp(flow.window());

    repo.store_code(flow, id, &code, &expires_at).await?;
    debug!(identity_id = id, flow = %flow, "one-time code issued");

    Ok(code)
}

/// Validate a submitted code for the given flow and identity.
///
/// Succeeds only if the stored code matches and the current time is
/// strictly before its expiry; the match-check and the clearing of the
/// code happen in one atomic store operation, so a code can never be
/// consumed twice. Every failure collapses into the single generic
/// `InvalidOrExpiredCode` outcome.
pub async fn validate(
    repo: &IdentityRepository<'_>,
    flow: CodeFlow,
    id: i64,
    submitted: &str,
) -> Result<()> {
    if repo.consume_code(flow, id, submitted).await? {
        debug!(identity_id = id, flow = %flow, "one-time code consumed");
        Ok(())
    } else {
        debug!(identity_id = id, flow = %flow, "one-time code rejected");
        Err(AuthError::InvalidOrExpiredCode)
    }
}
