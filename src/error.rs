//! Error types for medgate.

use thiserror::Error;

use crate::auth::password::PasswordError;
use crate::auth::pin::PinError;
use crate::auth::validation::ValidationError;

/// Common error type for medgate operations.
///
/// The first group of variants is the caller-facing failure taxonomy;
/// the second group wraps ambient failures (database, hashing, tokens,
/// configuration) that callers treat as internal.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The referenced resource does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// A uniqueness constraint would be violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Email/password pair did not authenticate.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The account has not completed email verification.
    #[error("account is not verified")]
    Unverified,

    /// A destructive action was attempted without supplying a pin.
    #[error("a pin is required for this action")]
    PinRequired,

    /// No authorization pin has been configured for the actor.
    #[error("no authorization pin has been configured")]
    PinNotConfigured,

    /// The supplied pin did not match.
    #[error("invalid pin")]
    InvalidPin,

    /// A submitted one-time code was wrong, expired, or already consumed.
    #[error("invalid or expired code")]
    InvalidOrExpiredCode,

    /// Token-level authentication failure.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Role or verification level is insufficient.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Malformed input (pin format, code format, field lengths).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Database error.
    #[error("database error: {0}")]
    Database(String),

    /// Credential hashing error.
    #[error("hashing error: {0}")]
    Hash(String),

    /// Token encoding error.
    #[error("token error: {0}")]
    Token(String),

    /// Notification channel failure.
    #[error("notification error: {0}")]
    Notification(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        AuthError::Database(e.to_string())
    }
}

impl From<ValidationError> for AuthError {
    fn from(e: ValidationError) -> Self {
        AuthError::InvalidInput(e.to_string())
    }
}

impl From<PasswordError> for AuthError {
    fn from(e: PasswordError) -> Self {
        match e {
            PasswordError::TooShort | PasswordError::TooLong => {
                AuthError::InvalidInput(e.to_string())
            }
            PasswordError::VerificationFailed => AuthError::InvalidCredentials,
            PasswordError::HashError(_) | PasswordError::InvalidHash => {
                AuthError::Hash(e.to_string())
            }
        }
    }
}

impl From<PinError> for AuthError {
    fn from(e: PinError) -> Self {
        match e {
            PinError::InvalidFormat => AuthError::InvalidInput(e.to_string()),
            PinError::Hash(_) => AuthError::Hash(e.to_string()),
        }
    }
}

/// Result type alias for medgate operations.
pub type Result<T> = std::result::Result<T, AuthError>;
