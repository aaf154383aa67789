//! Configuration module for medgate.

use serde::Deserialize;
use std::path::Path;

use crate::{AuthError, Result};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/medgate.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Bearer token configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    /// Server-held signing secret. Must be set before serving requests,
    /// either here or via the `MEDGATE_TOKEN_SECRET` environment variable.
    #[serde(default)]
    pub secret: String,
    /// Token validity window in hours.
    #[serde(default = "default_token_validity_hours")]
    pub validity_hours: i64,
}

fn default_token_validity_hours() -> i64 {
    24
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            validity_hours: default_token_validity_hours(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file path. Console output is always enabled.
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Token settings.
    #[serde(default)]
    pub token: TokenConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| AuthError::Config(e.to_string()))
    }

    /// Apply environment variable overrides.
    ///
    /// `MEDGATE_TOKEN_SECRET` overrides `token.secret` so the signing
    /// secret can stay out of the config file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var("MEDGATE_TOKEN_SECRET") {
            if !secret.is_empty() {
                self.token.secret = secret;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.token.secret.is_empty() {
            return Err(AuthError::Config(
                "token.secret must be set (or MEDGATE_TOKEN_SECRET exported)".to_string(),
            ));
        }
        if self.token.validity_hours <= 0 {
            return Err(AuthError::Config(
                "token.validity_hours must be positive".to_string(),
            ));
        }
        if self.database.path.is_empty() {
            return Err(AuthError::Config("database.path must be set".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.database.path, "data/medgate.db");
        assert_eq!(config.token.validity_hours, 24);
        assert!(config.token.secret.is_empty());
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_parse_empty() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.token.validity_hours, 24);
    }

    #[test]
    fn test_parse_partial() {
        let config = Config::parse(
            r#"
[token]
secret = "s3cret"

[logging]
level = "debug"
"#,
        )
        .unwrap();
        assert_eq!(config.token.secret, "s3cret");
        assert_eq!(config.token.validity_hours, 24);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.database.path, "data/medgate.db");
    }

    #[test]
    fn test_parse_full() {
        let config = Config::parse(
            r#"
[database]
path = "/tmp/test.db"

[token]
secret = "abc"
validity_hours = 12

[logging]
level = "warn"
file = "logs/medgate.log"
"#,
        )
        .unwrap();
        assert_eq!(config.database.path, "/tmp/test.db");
        assert_eq!(config.token.validity_hours, 12);
        assert_eq!(config.logging.file.as_deref(), Some("logs/medgate.log"));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Config::parse("not [valid toml").is_err());
    }

    #[test]
    fn test_validate_requires_secret() {
        let config = Config::default();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.token.secret = "secret".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_validity() {
        let mut config = Config::default();
        config.token.secret = "secret".to_string();
        config.token.validity_hours = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[token]\nsecret = \"from-file\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.token.secret, "from-file");
    }
}
