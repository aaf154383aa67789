//! Authentication flow service for medgate.
//!
//! This module orchestrates the credential store, one-time code issuer,
//! token issuer, and notification channel into the account flows:
//! registration, login, email verification, password reset, PIN
//! management, and the gated destructive deletion.

use std::sync::Arc;

use tokio::task;
use tracing::{debug, info, warn};

use crate::auth::code::{self, CodeFlow};
use crate::auth::gate::{AuthContext, AuthGate};
use crate::auth::token::TokenIssuer;
use crate::auth::validation::{normalize_email, validate_password, validate_registration};
use crate::auth::{password, pin};
use crate::db::{DbPool, Identity, IdentityRepository, NewIdentity, Role};
use crate::notify::NotificationChannel;
use crate::{AuthError, Result};

/// Result of a flow that authenticates the caller: the identity plus a
/// bearer token snapshotting its current role and verification state.
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    /// The authenticated identity.
    pub identity: Identity,
    /// Freshly issued bearer token.
    pub token: String,
}

/// Authentication service over a shared credential store.
pub struct AuthService {
    pool: DbPool,
    tokens: TokenIssuer,
    notifier: Arc<dyn NotificationChannel>,
}

impl AuthService {
    /// Create a new service.
    pub fn new(pool: DbPool, tokens: TokenIssuer, notifier: Arc<dyn NotificationChannel>) -> Self {
        Self {
            pool,
            tokens,
            notifier,
        }
    }

    /// The authorization gate sharing this service's store and tokens.
    pub fn gate(&self) -> AuthGate<'_> {
        AuthGate::new(&self.pool, &self.tokens)
    }

    fn repo(&self) -> IdentityRepository<'_> {
        IdentityRepository::new(&self.pool)
    }

    /// Register a new account.
    ///
    /// The first two accounts become admins; later ones start as guests.
    /// A verification code is issued and dispatched; the account is
    /// created unverified and the returned token snapshots that state.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password_plain: &str,
    ) -> Result<AuthOutcome> {
        let email = normalize_email(email);
        validate_registration(username, &email, password_plain)?;

        let repo = self.repo();
        if repo.username_exists(username).await? {
            return Err(AuthError::Conflict("username already registered".to_string()));
        }
        if repo.email_exists(&email).await? {
            return Err(AuthError::Conflict("email already registered".to_string()));
        }

        let password_hash = hash_password_blocking(password_plain.to_string()).await?;

        let identity = repo
            .create(&NewIdentity::new(username, &email, &password_hash))
            .await?;

        let verification = code::issue(&repo, CodeFlow::EmailVerification, identity.id).await?;
        self.notifier
            .send(&identity.email, &verification, CodeFlow::EmailVerification)?;

        let token = self.tokens.issue(&identity)?;

        info!(
            username = %identity.username,
            identity_id = identity.id,
            role = %identity.role,
            "new account registered"
        );

        Ok(AuthOutcome { identity, token })
    }

    /// Look up an account by email and verify a password against its
    /// stored hash. Fails NotFound when the email is unregistered;
    /// `login` folds that into InvalidCredentials before it reaches a
    /// caller.
    pub async fn verify_password(&self, email: &str, password_plain: &str) -> Result<Identity> {
        let email = normalize_email(email);

        let identity = self
            .repo()
            .get_by_email(&email)
            .await?
            .ok_or_else(|| AuthError::NotFound("account".to_string()))?;

        verify_password_blocking(password_plain.to_string(), identity.password.clone()).await?;

        Ok(identity)
    }

    /// Authenticate with email and password, returning a fresh token.
    ///
    /// Unknown email and wrong password collapse into one
    /// InvalidCredentials outcome; the log keeps the distinction.
    pub async fn login(&self, email: &str, password_plain: &str) -> Result<AuthOutcome> {
        let identity = self.verify_password(email, password_plain).await.map_err(
            |e| match e {
                AuthError::NotFound(_) => {
                    debug!("login attempt for unknown email");
                    AuthError::InvalidCredentials
                }
                other => other,
            },
        )?;

        let token = self.tokens.issue(&identity)?;

        info!(identity_id = identity.id, "login succeeded");

        Ok(AuthOutcome { identity, token })
    }

    /// Verify an email address with a pending verification code.
    ///
    /// Flips the account to verified exactly once; the consumed code is
    /// cleared atomically with the match and can never be replayed. A
    /// fresh token is issued so the caller's snapshot reflects the new
    /// state.
    pub async fn verify_email(&self, email: &str, submitted_code: &str) -> Result<AuthOutcome> {
        let email = normalize_email(email);
        let repo = self.repo();

        let identity = repo
            .get_by_email(&email)
            .await?
            .ok_or_else(|| AuthError::NotFound("account".to_string()))?;

        if identity.is_verified {
            return Err(AuthError::Conflict("email already verified".to_string()));
        }

        code::validate(&repo, CodeFlow::EmailVerification, identity.id, submitted_code).await?;
        repo.set_verified(identity.id).await?;

        let identity = repo
            .get_by_id(identity.id)
            .await?
            .ok_or_else(|| AuthError::NotFound("account".to_string()))?;
        let token = self.tokens.issue(&identity)?;

        info!(identity_id = identity.id, "email verified");

        Ok(AuthOutcome { identity, token })
    }

    /// Re-issue a verification code for an unverified account.
    pub async fn resend_verification(&self, email: &str) -> Result<()> {
        let email = normalize_email(email);
        let repo = self.repo();

        let identity = repo
            .get_by_email(&email)
            .await?
            .ok_or_else(|| AuthError::NotFound("account".to_string()))?;

        if identity.is_verified {
            return Err(AuthError::Conflict("email already verified".to_string()));
        }

        let code = code::issue(&repo, CodeFlow::EmailVerification, identity.id).await?;
        self.notifier
            .send(&identity.email, &code, CodeFlow::EmailVerification)?;

        info!(identity_id = identity.id, "verification code re-issued");

        Ok(())
    }

    /// Request a password reset code.
    ///
    /// The visible outcome is identical whether or not the email is
    /// registered; the code is only written and dispatched when it is.
    /// Internal logs keep the distinction.
    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        let email = normalize_email(email);
        let repo = self.repo();

        match repo.get_by_email(&email).await? {
            Some(identity) => {
                let code = code::issue(&repo, CodeFlow::PasswordReset, identity.id).await?;
                if let Err(e) =
                    self.notifier
                        .send(&identity.email, &code, CodeFlow::PasswordReset)
                {
                    warn!(identity_id = identity.id, error = %e, "password reset delivery failed");
                } else {
                    info!(identity_id = identity.id, "password reset code issued");
                }
            }
            None => {
                debug!("password reset requested for unknown email");
            }
        }

        Ok(())
    }

    /// Replace the password using a pending reset code.
    pub async fn reset_password(
        &self,
        email: &str,
        submitted_code: &str,
        new_password: &str,
    ) -> Result<AuthOutcome> {
        let email = normalize_email(email);
        let repo = self.repo();

        let identity = repo
            .get_by_email(&email)
            .await?
            .ok_or_else(|| AuthError::NotFound("account".to_string()))?;

        // Reject malformed passwords before consuming the code.
        validate_password(new_password, &identity.username)?;

        code::validate(&repo, CodeFlow::PasswordReset, identity.id, submitted_code).await?;

        let password_hash = hash_password_blocking(new_password.to_string()).await?;
        repo.set_password(identity.id, &password_hash).await?;

        let identity = repo
            .get_by_id(identity.id)
            .await?
            .ok_or_else(|| AuthError::NotFound("account".to_string()))?;
        let token = self.tokens.issue(&identity)?;

        info!(identity_id = identity.id, "password reset");

        Ok(AuthOutcome { identity, token })
    }

    /// Set an admin's destructive-action PIN.
    ///
    /// Only admin identities may hold a PIN, and it must be exactly four
    /// ASCII digits. Once set, the PIN can only be replaced through the
    /// reset flow.
    pub async fn set_pin(&self, identity_id: i64, pin_plain: &str) -> Result<()> {
        let repo = self.repo();

        let identity = repo
            .get_by_id(identity_id)
            .await?
            .ok_or_else(|| AuthError::NotFound("account".to_string()))?;

        if !identity.is_admin() {
            return Err(AuthError::Forbidden(
                "only admins may hold a pin".to_string(),
            ));
        }

        pin::validate_pin_format(pin_plain)?;

        let pin_hash = hash_pin_blocking(pin_plain.to_string()).await?;
        repo.set_pin_hash(identity.id, &pin_hash).await?;

        info!(identity_id = identity.id, "pin configured");

        Ok(())
    }

    /// Request a PIN reset code.
    ///
    /// Identical visible outcome for unknown emails and non-admin
    /// accounts; the code is only written and dispatched for admins.
    pub async fn request_pin_reset(&self, email: &str) -> Result<()> {
        let email = normalize_email(email);
        let repo = self.repo();

        match repo.get_by_email(&email).await? {
            Some(identity) if identity.is_admin() => {
                let code = code::issue(&repo, CodeFlow::PinReset, identity.id).await?;
                if let Err(e) = self.notifier.send(&identity.email, &code, CodeFlow::PinReset) {
                    warn!(identity_id = identity.id, error = %e, "pin reset delivery failed");
                } else {
                    info!(identity_id = identity.id, "pin reset code issued");
                }
            }
            Some(_) => {
                debug!("pin reset requested for non-admin account");
            }
            None => {
                debug!("pin reset requested for unknown email");
            }
        }

        Ok(())
    }

    /// Replace an admin's PIN using a pending reset code.
    pub async fn reset_pin(
        &self,
        email: &str,
        submitted_code: &str,
        new_pin: &str,
    ) -> Result<()> {
        let email = normalize_email(email);
        let repo = self.repo();

        let identity = repo
            .get_by_email(&email)
            .await?
            .ok_or_else(|| AuthError::NotFound("account".to_string()))?;

        if !identity.is_admin() {
            return Err(AuthError::Forbidden(
                "only admins may hold a pin".to_string(),
            ));
        }

        pin::validate_pin_format(new_pin)?;

        code::validate(&repo, CodeFlow::PinReset, identity.id, submitted_code).await?;

        let pin_hash = hash_pin_blocking(new_pin.to_string()).await?;
        repo.set_pin_hash(identity.id, &pin_hash).await?;

        info!(identity_id = identity.id, "pin reset");

        Ok(())
    }

    /// Change an account's role. Admin-only; demoting an admin also
    /// drops its PIN.
    pub async fn update_role(
        &self,
        actor: &AuthContext,
        target_id: i64,
        role: Role,
    ) -> Result<()> {
        self.gate().require_role(actor, &[Role::Admin])?;
        self.repo().update_role(target_id, role).await?;

        info!(
            actor_id = actor.identity_id,
            target_id, role = %role, "role updated"
        );

        Ok(())
    }

    /// Delete an account. Irreversible, and therefore gated on the
    /// destructive-action PIN policy evaluated immediately beforehand.
    pub async fn delete_identity(
        &self,
        actor: &AuthContext,
        target_id: i64,
        supplied_pin: Option<&str>,
    ) -> Result<()> {
        self.gate()
            .authorize_destructive_action(actor, supplied_pin)
            .await?;

        self.repo().delete(target_id).await?;

        info!(
            actor_id = actor.identity_id,
            target_id, "account deleted"
        );

        Ok(())
    }
}

/// Hash a password off the request-handling thread.
async fn hash_password_blocking(password_plain: String) -> Result<String> {
    let hash = task::spawn_blocking(move || password::hash_password(&password_plain))
        .await
        .map_err(|e| AuthError::Hash(format!("hashing task failed: {e}")))??;
    Ok(hash)
}

/// Verify a password off the request-handling thread.
async fn verify_password_blocking(password_plain: String, hash: String) -> Result<()> {
    task::spawn_blocking(move || password::verify_password(&password_plain, &hash))
        .await
        .map_err(|e| AuthError::Hash(format!("hashing task failed: {e}")))??;
    Ok(())
}

/// Hash a PIN off the request-handling thread.
async fn hash_pin_blocking(pin_plain: String) -> Result<String> {
    let hash = task::spawn_blocking(move || pin::hash_pin(&pin_plain))
        .await
        .map_err(|e| AuthError::Hash(format!("hashing task failed: {e}")))??;
    Ok(hash)
}
