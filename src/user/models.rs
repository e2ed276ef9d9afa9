//! User data models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User entity from database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: String,
    pub updated_at: String,
    pub last_login_at: Option<String>,
}

impl User {
    /// Display name derived from the user's first and last name.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Public user info (safe to return to clients).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub created_at: String,
    pub last_login_at: Option<String>,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        let display_name = user.display_name();
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            display_name,
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }
}

/// Request to create a new user.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Request to update an existing user.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: "usr_1".to_string(),
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "secret".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            created_at: "2024-01-01".to_string(),
            updated_at: "2024-01-01".to_string(),
            last_login_at: None,
        }
    }

    #[test]
    fn test_display_name_composed_from_first_and_last() {
        assert_eq!(sample_user().display_name(), "Ada Lovelace");
    }

    #[test]
    fn test_user_info_omits_password_hash() {
        let info: UserInfo = sample_user().into();
        assert_eq!(info.display_name, "Ada Lovelace");

        let json = serde_json::to_value(&info).unwrap();
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn test_user_serialization_skips_password_hash() {
        let json = serde_json::to_value(sample_user()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["username"], "ada");
    }
}
