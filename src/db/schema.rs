//! Database schema and migrations for medgate.
//!
//! Migrations are applied sequentially when the database is opened.
//! The schema_version table tracks which migrations have been applied.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: Initial schema - identities table
    r#"
-- Identities table: one row per account
CREATE TABLE identities (
    id                       INTEGER PRIMARY KEY AUTOINCREMENT,
    username                 TEXT NOT NULL UNIQUE,
    email                    TEXT NOT NULL UNIQUE,    -- stored lowercase
    password                 TEXT NOT NULL,           -- Argon2 hash
    role                     TEXT NOT NULL DEFAULT 'guest',  -- 'admin', 'doctor', 'guest'
    is_verified              INTEGER NOT NULL DEFAULT 0,
    verification_code        TEXT,
    verification_expires_at  TEXT,
    reset_code               TEXT,
    reset_expires_at         TEXT,
    created_at               TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_identities_email ON identities(email);
CREATE INDEX idx_identities_role ON identities(role);
"#,
    // v2: PIN gate for destructive actions
    r#"
ALTER TABLE identities ADD COLUMN pin TEXT;
ALTER TABLE identities ADD COLUMN pin_reset_code TEXT;
ALTER TABLE identities ADD COLUMN pin_reset_expires_at TEXT;
"#,
];
