//! User service for business logic.

use anyhow::{Context, Result, bail};
use tracing::{info, instrument};

use super::models::{CreateUserRequest, UpdateUserRequest, User};
use super::repository::UserRepository;

/// Service for user management operations.
#[derive(Debug, Clone)]
pub struct UserService {
    repo: UserRepository,
}

impl UserService {
    /// Create a new user service.
    pub fn new(repo: UserRepository) -> Self {
        Self { repo }
    }

    /// Create a new user with validation.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn create_user(&self, request: CreateUserRequest) -> Result<User> {
        if !is_valid_username(&request.username) {
            bail!(
                "Invalid username format. Must be 3-50 alphanumeric characters, underscores, or hyphens."
            );
        }

        if !is_valid_email(&request.email) {
            bail!("Invalid email format.");
        }

        if !is_valid_name(&request.first_name) || !is_valid_name(&request.last_name) {
            bail!("First and last name must be 1-100 characters.");
        }

        if !self.repo.is_username_available(&request.username).await? {
            bail!("Username '{}' is already taken.", request.username);
        }

        if !self.repo.is_email_available(&request.email).await? {
            bail!("Email '{}' is already registered.", request.email);
        }

        if request.password.len() < 6 {
            bail!("Password must be at least 6 characters.");
        }

        let mut processed_request = request;
        processed_request.password = hash_password(&processed_request.password)?;

        let user = self.repo.create(processed_request).await?;
        info!(user_id = %user.id, username = %user.username, "Created new user");

        Ok(user)
    }

    /// Get a user by ID.
    #[instrument(skip(self))]
    pub async fn get_user(&self, id: &str) -> Result<Option<User>> {
        self.repo.get(id).await
    }

    /// Get a user by username.
    #[instrument(skip(self))]
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.repo.get_by_username(username).await
    }

    /// Update a user.
    #[instrument(skip(self, request))]
    pub async fn update_user(&self, id: &str, request: UpdateUserRequest) -> Result<User> {
        if let Some(email) = &request.email {
            if !is_valid_email(email) {
                bail!("Invalid email format.");
            }
            if let Some(existing) = self.repo.get_by_email(email).await? {
                if existing.id != id {
                    bail!("Email '{}' is already registered.", email);
                }
            }
        }

        if let Some(first_name) = &request.first_name {
            if !is_valid_name(first_name) {
                bail!("First and last name must be 1-100 characters.");
            }
        }
        if let Some(last_name) = &request.last_name {
            if !is_valid_name(last_name) {
                bail!("First and last name must be 1-100 characters.");
            }
        }

        let mut processed_request = request;
        if let Some(password) = &processed_request.password {
            if password.len() < 6 {
                bail!("Password must be at least 6 characters.");
            }
            processed_request.password = Some(hash_password(password)?);
        }

        let user = self.repo.update(id, processed_request).await?;
        info!(user_id = %user.id, "Updated user");

        Ok(user)
    }

    /// Verify user credentials.
    ///
    /// Returns the user on success and updates their last-login stamp;
    /// returns `None` for an unknown username or a wrong password.
    #[instrument(skip(self, password))]
    pub async fn verify_credentials(&self, username: &str, password: &str) -> Result<Option<User>> {
        let user = self.repo.get_by_username(username).await?;

        match user {
            Some(user) => {
                if verify_password(password, &user.password_hash)? {
                    self.repo.update_last_login(&user.id).await?;
                    return Ok(Some(user));
                }
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

/// Validate username format.
fn is_valid_username(username: &str) -> bool {
    let len = username.len();
    if !(3..=50).contains(&len) {
        return false;
    }

    username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Basic email validation.
fn is_valid_email(email: &str) -> bool {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }
    !parts[0].is_empty() && parts[1].contains('.')
}

/// Validate a first or last name.
fn is_valid_name(name: &str) -> bool {
    let trimmed = name.trim();
    (1..=100).contains(&trimmed.chars().count())
}

/// Hash a password using bcrypt.
fn hash_password(password: &str) -> Result<String> {
    // Use a lower cost factor for development speed
    let cost = if cfg!(debug_assertions) { 4 } else { 10 };
    bcrypt::hash(password, cost).context("Failed to hash password")
}

/// Verify a password against a bcrypt hash.
fn verify_password(password: &str, hash: &str) -> Result<bool> {
    bcrypt::verify(password, hash).context("Failed to verify password")
}
