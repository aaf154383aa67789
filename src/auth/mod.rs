//! Authentication module for medgate.
//!
//! This module provides credential hashing, one-time codes, bearer
//! tokens, the authorization gate, and the account flow service.

pub mod code;
mod gate;
pub mod password;
pub mod pin;
mod service;
mod token;
pub mod validation;

pub use code::{generate_code, CodeFlow, CODE_MAX, CODE_MIN};
pub use gate::{AuthContext, AuthGate};
pub use password::{hash_password, verify_password, PasswordError};
pub use pin::{hash_pin, validate_pin_format, verify_pin, PinError, PIN_LENGTH};
pub use service::{AuthOutcome, AuthService};
pub use token::{Claims, TokenIssuer, DEFAULT_TOKEN_VALIDITY_HOURS};
pub use validation::{normalize_email, validate_registration, ValidationError};
