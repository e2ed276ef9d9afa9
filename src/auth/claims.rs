//! JWT claims.

use serde::{Deserialize, Serialize};

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: String,

    /// Expiration time (as Unix timestamp).
    pub exp: i64,

    /// Issued at (as Unix timestamp).
    #[serde(default)]
    pub iat: Option<i64>,

    /// User's email.
    #[serde(default)]
    pub email: Option<String>,

    /// User's display name.
    #[serde(default)]
    pub name: Option<String>,
}

impl Claims {
    /// Get the display name for the user.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_display_name() {
        let claims = Claims {
            sub: "usr_123".to_string(),
            exp: 0,
            iat: None,
            email: Some("ada@example.com".to_string()),
            name: Some("Ada Lovelace".to_string()),
        };
        assert_eq!(claims.display_name(), "Ada Lovelace");

        let claims_no_name = Claims {
            name: None,
            ..claims.clone()
        };
        assert_eq!(claims_no_name.display_name(), "ada@example.com");

        let claims_only_sub = Claims {
            name: None,
            email: None,
            ..claims
        };
        assert_eq!(claims_only_sub.display_name(), "usr_123");
    }
}
