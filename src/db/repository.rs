//! Identity repository for medgate.
//!
//! This module provides the persistence operations behind the credential
//! store: lookups, the role-assigning insert, credential updates, and the
//! one-time code writes and consumes.

use sqlx::Row;

use super::identity::{Identity, NewIdentity, Role};
use super::DbPool;
use crate::auth::code::CodeFlow;
use crate::{AuthError, Result};

const IDENTITY_COLUMNS: &str = "id, username, email, password, role, is_verified, \
     verification_code, verification_expires_at, reset_code, reset_expires_at, \
     pin, pin_reset_code, pin_reset_expires_at, created_at";

/// Repository for identity operations.
pub struct IdentityRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> IdentityRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a new identity.
    ///
    /// The role is derived from the current identity count inside the
    /// INSERT itself: while fewer than two identities exist the new row
    /// becomes an admin, otherwise a guest. Running the count and the
    /// insert as one statement keeps concurrent registrations from both
    /// claiming the same admin slot.
    pub async fn create(&self, new_identity: &NewIdentity) -> Result<Identity> {
        let result = sqlx::query(
            "INSERT INTO identities (username, email, password, role)
             VALUES ($1, $2, $3,
                     CASE WHEN (SELECT COUNT(*) FROM identities) < 2
                          THEN 'admin' ELSE 'guest' END)",
        )
        .bind(&new_identity.username)
        .bind(&new_identity.email)
        .bind(&new_identity.password)
        .execute(self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AuthError::Conflict("username or email already registered".to_string())
            }
            _ => AuthError::Database(e.to_string()),
        })?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .ok_or_else(|| AuthError::NotFound("identity".to_string()))
    }

    /// Get an identity by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Identity>> {
        let sql = format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE id = $1");
        let identity = sqlx::query_as::<_, Identity>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(identity)
    }

    /// Get an identity by username.
    pub async fn get_by_username(&self, username: &str) -> Result<Option<Identity>> {
        let sql = format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE username = $1");
        let identity = sqlx::query_as::<_, Identity>(&sql)
            .bind(username)
            .fetch_optional(self.pool)
            .await?;

        Ok(identity)
    }

    /// Get an identity by email. Emails are stored lowercase; callers
    /// normalize before lookup.
    pub async fn get_by_email(&self, email: &str) -> Result<Option<Identity>> {
        let sql = format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE email = $1");
        let identity = sqlx::query_as::<_, Identity>(&sql)
            .bind(email)
            .fetch_optional(self.pool)
            .await?;

        Ok(identity)
    }

    /// Check if a username is already taken.
    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM identities WHERE username = $1)")
                .bind(username)
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }

    /// Check if an email is already registered.
    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM identities WHERE email = $1)")
                .bind(email)
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }

    /// Count all identities.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM identities")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Find the admin identity with the earliest creation timestamp.
    ///
    /// This is the fallback authority for destructive actions by
    /// non-admin actors (the "global admin PIN" holder). Ties on the
    /// second-resolution timestamp break on insert order.
    pub async fn find_earliest_admin(&self) -> Result<Option<Identity>> {
        let sql = format!(
            "SELECT {IDENTITY_COLUMNS} FROM identities
             WHERE role = 'admin'
             ORDER BY created_at ASC, id ASC
             LIMIT 1"
        );
        let identity = sqlx::query_as::<_, Identity>(&sql)
            .fetch_optional(self.pool)
            .await?;

        Ok(identity)
    }

    /// List all identities, oldest first.
    pub async fn list(&self) -> Result<Vec<Identity>> {
        let sql =
            format!("SELECT {IDENTITY_COLUMNS} FROM identities ORDER BY created_at ASC, id ASC");
        let identities = sqlx::query_as::<_, Identity>(&sql)
            .fetch_all(self.pool)
            .await?;

        Ok(identities)
    }

    /// Change an identity's role.
    ///
    /// Demoting an identity out of admin also drops its PIN and any
    /// pending PIN-reset code, since only admins may carry a PIN.
    pub async fn update_role(&self, id: i64, role: Role) -> Result<()> {
        let result = sqlx::query(
            "UPDATE identities
             SET role = $1,
                 pin = CASE WHEN $1 = 'admin' THEN pin ELSE NULL END,
                 pin_reset_code = CASE WHEN $1 = 'admin' THEN pin_reset_code ELSE NULL END,
                 pin_reset_expires_at = CASE WHEN $1 = 'admin' THEN pin_reset_expires_at ELSE NULL END
             WHERE id = $2",
        )
        .bind(role.as_str())
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound("identity".to_string()));
        }
        Ok(())
    }

    /// Replace an identity's password hash.
    pub async fn set_password(&self, id: i64, password_hash: &str) -> Result<()> {
        let result = sqlx::query("UPDATE identities SET password = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound("identity".to_string()));
        }
        Ok(())
    }

    /// Mark an identity as verified.
    pub async fn set_verified(&self, id: i64) -> Result<()> {
        let result = sqlx::query("UPDATE identities SET is_verified = 1 WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound("identity".to_string()));
        }
        Ok(())
    }

    /// Store an identity's PIN hash.
    pub async fn set_pin_hash(&self, id: i64, pin_hash: &str) -> Result<()> {
        let result = sqlx::query("UPDATE identities SET pin = $1 WHERE id = $2")
            .bind(pin_hash)
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound("identity".to_string()));
        }
        Ok(())
    }

    /// Write a one-time code and its paired expiry for the given flow,
    /// overwriting any code already pending for that flow.
    pub async fn store_code(
        &self,
        flow: CodeFlow,
        id: i64,
        code: &str,
        expires_at: &str,
    ) -> Result<()> {
        let sql = format!(
            "UPDATE identities SET {code_col} = $1, {expiry_col} = $2 WHERE id = $3",
            code_col = flow.code_column(),
            expiry_col = flow.expiry_column(),
        );
        let result = sqlx::query(&sql)
            .bind(code)
            .bind(expires_at)
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound("identity".to_string()));
        }
        Ok(())
    }

    /// Check a submitted code against the pending one for the flow and
    /// clear it on a match, as one atomic statement.
    ///
    /// Returns true only if the stored code equalled the submission and
    /// had not yet expired; the code and expiry are cleared in the same
    /// statement, so at most one concurrent caller can observe a match.
    pub async fn consume_code(&self, flow: CodeFlow, id: i64, code: &str) -> Result<bool> {
        let sql = format!(
            "UPDATE identities
             SET {code_col} = NULL, {expiry_col} = NULL
             WHERE id = $1
               AND {code_col} = $2
               AND {expiry_col} > datetime('now')",
            code_col = flow.code_column(),
            expiry_col = flow.expiry_column(),
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(code)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Read the pending code and expiry for a flow, if any.
    pub async fn pending_code(&self, flow: CodeFlow, id: i64) -> Result<Option<(String, String)>> {
        let sql = format!(
            "SELECT {code_col}, {expiry_col} FROM identities WHERE id = $1",
            code_col = flow.code_column(),
            expiry_col = flow.expiry_column(),
        );
        let row = sqlx::query(&sql).bind(id).fetch_optional(self.pool).await?;

        let row = row.ok_or_else(|| AuthError::NotFound("identity".to_string()))?;
        let code: Option<String> = row.get(0);
        let expiry: Option<String> = row.get(1);

        Ok(code.zip(expiry))
    }

    /// Delete an identity. This is the irreversible operation the PIN
    /// gate protects.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM identities WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound("identity".to_string()));
        }
        Ok(())
    }
}
