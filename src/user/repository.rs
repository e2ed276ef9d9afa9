//! User repository for database operations.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use super::models::{CreateUserRequest, UpdateUserRequest, User};

const USER_COLUMNS: &str = "id, username, email, password_hash, first_name, last_name, \
     created_at, updated_at, last_login_at";

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Create a new user repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Generate a new user ID.
    fn generate_id() -> String {
        format!("usr_{}", nanoid::nanoid!(12))
    }

    /// Create a new user. The password in `request` must already be hashed.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn create(&self, request: CreateUserRequest) -> Result<User> {
        let id = Self::generate_id();

        debug!("Creating user: {} ({})", request.username, id);

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, first_name, last_name)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&request.username)
        .bind(&request.email)
        .bind(&request.password)
        .bind(&request.first_name)
        .bind(&request.last_name)
        .execute(&self.pool)
        .await
        .context("Failed to insert user")?;

        self.get(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after creation"))
    }

    /// Get a user by ID.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user")?;

        Ok(user)
    }

    /// Get a user by username.
    #[instrument(skip(self))]
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by username")?;

        Ok(user)
    }

    /// Get a user by email.
    #[instrument(skip(self))]
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by email")?;

        Ok(user)
    }

    /// Update a user.
    #[instrument(skip(self, request))]
    pub async fn update(&self, id: &str, request: UpdateUserRequest) -> Result<User> {
        let existing = self
            .get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found: {}", id))?;

        let mut updates = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if let Some(email) = &request.email {
            updates.push("email = ?");
            values.push(email.clone());
        }

        if let Some(password) = &request.password {
            updates.push("password_hash = ?");
            values.push(password.clone());
        }

        if let Some(first_name) = &request.first_name {
            updates.push("first_name = ?");
            values.push(first_name.clone());
        }

        if let Some(last_name) = &request.last_name {
            updates.push("last_name = ?");
            values.push(last_name.clone());
        }

        if updates.is_empty() {
            return Ok(existing);
        }

        updates.push("updated_at = datetime('now')");

        let sql = format!("UPDATE users SET {} WHERE id = ?", updates.join(", "));

        let mut query_builder = sqlx::query(&sql);
        for value in &values {
            query_builder = query_builder.bind(value);
        }
        query_builder = query_builder.bind(id);

        query_builder
            .execute(&self.pool)
            .await
            .context("Failed to update user")?;

        self.get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after update"))
    }

    /// Update last login timestamp.
    #[instrument(skip(self))]
    pub async fn update_last_login(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE users SET last_login_at = datetime('now') WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update last login")?;

        Ok(())
    }

    /// Check if a username is available.
    #[instrument(skip(self))]
    pub async fn is_username_available(&self, username: &str) -> Result<bool> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .context("Failed to check username availability")?;

        Ok(count.0 == 0)
    }

    /// Check if an email is available.
    #[instrument(skip(self))]
    pub async fn is_email_available(&self, email: &str) -> Result<bool> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .context("Failed to check email availability")?;

        Ok(count.0 == 0)
    }

    /// Count total users.
    #[instrument(skip(self))]
    pub async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count users")?;

        Ok(count.0)
    }
}
