//! PIN hashing and validation for medgate.
//!
//! A PIN is a 4-digit secondary factor gating destructive actions, not a
//! primary credential: it is hashed with a deliberately cheaper Argon2id
//! parameter set than passwords so gate checks stay fast under load.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params,
};
use rand_core::OsRng;
use thiserror::Error;

/// Required PIN length in ASCII digits.
pub const PIN_LENGTH: usize = 4;

/// PIN-related errors.
#[derive(Error, Debug)]
pub enum PinError {
    /// PIN is not exactly four ASCII digits.
    #[error("pin must be exactly {PIN_LENGTH} digits")]
    InvalidFormat,

    /// PIN hashing failed.
    #[error("pin hashing failed: {0}")]
    Hash(String),
}

/// Create the Argon2 hasher with PIN-grade parameters.
///
/// Parameters:
/// - Memory cost: 19 MB (19456 KiB)
/// - Time cost: 2 iterations
/// - Parallelism: 1 thread
fn create_argon2() -> Argon2<'static> {
    let m_cost = 19456;
    let t_cost = 2;
    let p_cost = 1;

    let params = Params::new(m_cost, t_cost, p_cost, None).expect("valid Argon2 params");
    Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params)
}

/// Validate that a candidate PIN is exactly four ASCII digits.
pub fn validate_pin_format(pin: &str) -> Result<(), PinError> {
    if pin.len() != PIN_LENGTH || !pin.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PinError::InvalidFormat);
    }
    Ok(())
}

/// Hash a PIN using Argon2id with PIN-grade parameters.
pub fn hash_pin(pin: &str) -> Result<String, PinError> {
    validate_pin_format(pin)?;

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = create_argon2();
    let hash = argon2
        .hash_password(pin.as_bytes(), &salt)
        .map_err(|e| PinError::Hash(e.to_string()))?;

    Ok(hash.to_string())
}

/// Compare a candidate PIN against a stored hash.
///
/// Returns false on mismatch or on an unparseable stored hash; there is
/// nothing useful a caller can do with the distinction.
pub fn verify_pin(candidate: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed_hash)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_pin_format() {
        assert!(validate_pin_format("1234").is_ok());
        assert!(validate_pin_format("0000").is_ok());
        assert!(matches!(
            validate_pin_format("123"),
            Err(PinError::InvalidFormat)
        ));
        assert!(matches!(
            validate_pin_format("12345"),
            Err(PinError::InvalidFormat)
        ));
        assert!(matches!(
            validate_pin_format("12a4"),
            Err(PinError::InvalidFormat)
        ));
        assert!(matches!(
            validate_pin_format("12 4"),
            Err(PinError::InvalidFormat)
        ));
        // Non-ASCII digits are rejected.
        assert!(matches!(
            validate_pin_format("１２３４"),
            Err(PinError::InvalidFormat)
        ));
    }

    #[test]
    fn test_hash_pin_is_phc() {
        let hash = hash_pin("1234").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert_ne!(hash, "1234");
    }

    #[test]
    fn test_hash_pin_rejects_bad_format() {
        assert!(matches!(hash_pin("abcd"), Err(PinError::InvalidFormat)));
    }

    #[test]
    fn test_pin_grade_params_are_cheaper_than_password_grade() {
        let hash = hash_pin("1234").unwrap();
        assert!(hash.contains("m=19456"));
        assert!(hash.contains("t=2"));
        assert!(hash.contains("p=1"));
    }

    #[test]
    fn test_verify_pin() {
        let hash = hash_pin("1234").unwrap();
        assert!(verify_pin("1234", &hash));
        assert!(!verify_pin("4321", &hash));
    }

    #[test]
    fn test_verify_pin_against_other_hash() {
        let hash = hash_pin("4321").unwrap();
        assert!(!verify_pin("1234", &hash));
    }

    #[test]
    fn test_verify_pin_invalid_hash() {
        assert!(!verify_pin("1234", "not_a_valid_hash"));
    }
}
