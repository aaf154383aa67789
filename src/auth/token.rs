//! Bearer token issuance and decoding for medgate.
//!
//! Tokens are HS256 JWTs carrying a point-in-time snapshot of the
//! holder's role and verification flag. The snapshot is not re-derived
//! on use; it goes stale until a flow re-issues a token, bounded by the
//! validity window.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db::{Identity, Role};
use crate::{AuthError, Result};

/// Default token validity window in hours.
pub const DEFAULT_TOKEN_VALIDITY_HOURS: i64 = 24;

/// Bearer token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (identity ID).
    pub sub: i64,
    /// Role snapshot at issue time.
    pub role: Role,
    /// Verification snapshot at issue time.
    pub verified: bool,
    /// Issued at timestamp.
    pub iat: u64,
    /// Expiration timestamp.
    pub exp: u64,
    /// Token ID (unique identifier).
    pub jti: String,
}

/// Issues and decodes bearer tokens with a server-held secret.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    validity_hours: i64,
}

impl TokenIssuer {
    /// Create a token issuer from a signing secret.
    pub fn new(secret: &str, validity_hours: i64) -> Self {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            validity_hours,
        }
    }

    /// Issue a token for an identity, snapshotting its current role and
    /// verification state.
    pub fn issue(&self, identity: &Identity) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: identity.id,
            role: identity.role,
            verified: identity.is_verified,
            iat: now as u64,
            exp: (now + self.validity_hours * 3600) as u64,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Token(e.to_string()))
    }

    /// Decode and validate a token, returning its claims.
    pub fn decode(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("token validation failed: {}", e);
                AuthError::Unauthorized("invalid or expired token".to_string())
            })
    }
}
