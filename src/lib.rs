//! medgate - identity and destructive-action authorization core
//!
//! The account and authorization layer of a clinical reporting service:
//! registration with automatic role assignment, time-boxed one-time
//! codes for email verification and password/PIN resets, hashed
//! credential storage, bearer-token issuance, and the PIN gate that
//! protects irreversible deletions.

pub mod auth;
pub mod config;
pub mod datetime;
pub mod db;
pub mod error;
pub mod logging;
pub mod notify;

pub use auth::{
    generate_code, hash_password, hash_pin, normalize_email, validate_pin_format,
    validate_registration, verify_password, verify_pin, AuthContext, AuthGate, AuthOutcome,
    AuthService, Claims, CodeFlow, PasswordError, PinError, TokenIssuer, ValidationError,
    CODE_MAX, CODE_MIN, DEFAULT_TOKEN_VALIDITY_HOURS, PIN_LENGTH,
};
pub use config::Config;
pub use db::{Database, DbPool, Identity, IdentityRepository, NewIdentity, Role};
pub use error::{AuthError, Result};
pub use notify::{LogNotifier, MemoryNotifier, NotificationChannel, SentCode};
