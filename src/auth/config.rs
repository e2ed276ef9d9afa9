//! Authentication configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum acceptable JWT secret length outside dev mode.
const MIN_SECRET_LEN: usize = 32;

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Secret used to sign and verify JWTs. Required outside dev mode.
    pub jwt_secret: Option<String>,

    /// Dev mode: relaxes secret requirements, omits the Secure cookie
    /// flag, and permits localhost CORS origins.
    pub dev_mode: bool,

    /// Token lifetime in hours.
    pub token_ttl_hours: i64,

    /// Origins allowed by the CORS layer.
    pub allowed_origins: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            dev_mode: false,
            token_ttl_hours: 24,
            allowed_origins: Vec::new(),
        }
    }
}

/// Errors produced by [`AuthConfig::validate`].
#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("auth.jwt_secret is required outside dev mode")]
    MissingSecret,

    #[error("auth.jwt_secret must be at least {MIN_SECRET_LEN} characters")]
    WeakSecret,

    #[error("auth.token_ttl_hours must be positive")]
    InvalidTtl,
}

impl AuthConfig {
    /// Validate the configuration before the server starts.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.token_ttl_hours <= 0 {
            return Err(ConfigValidationError::InvalidTtl);
        }

        if self.dev_mode {
            return Ok(());
        }

        match &self.jwt_secret {
            None => Err(ConfigValidationError::MissingSecret),
            Some(secret) if secret.len() < MIN_SECRET_LEN => {
                Err(ConfigValidationError::WeakSecret)
            }
            Some(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_requires_secret_in_production() {
        let config = AuthConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::MissingSecret)
        ));
    }

    #[test]
    fn test_validate_rejects_short_secret() {
        let config = AuthConfig {
            jwt_secret: Some("short".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::WeakSecret)
        ));
    }

    #[test]
    fn test_validate_accepts_dev_mode_without_secret() {
        let config = AuthConfig {
            dev_mode: true,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_positive_ttl() {
        let config = AuthConfig {
            dev_mode: true,
            token_ttl_hours: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::InvalidTtl)
        ));
    }
}
