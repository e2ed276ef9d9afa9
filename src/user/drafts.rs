//! Staged registration drafts.
//!
//! Registration is a two-step flow: the profile step creates a short-lived
//! draft record, and the credentials step consumes it. Drafts are
//! single-use; consumption is an atomic delete whose affected-row count
//! decides the winner when two tabs race to complete the same draft.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, instrument};

/// Profile data collected by the first registration step.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct StartRegistration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// A staged registration awaiting credentials.
#[derive(Debug, Clone, FromRow)]
pub struct RegistrationDraft {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub created_at: String,
    pub expires_at: String,
}

/// Repository for registration drafts.
#[derive(Debug, Clone)]
pub struct RegistrationDraftRepository {
    pool: SqlitePool,
    ttl: Duration,
}

impl RegistrationDraftRepository {
    /// Create a new draft repository with the given time-to-live.
    pub fn new(pool: SqlitePool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    fn generate_id() -> String {
        format!("reg_{}", nanoid::nanoid!(21))
    }

    /// Stage a new draft. Expired drafts are purged opportunistically.
    #[instrument(skip(self, profile), fields(email = %profile.email))]
    pub async fn create(&self, profile: StartRegistration) -> Result<RegistrationDraft> {
        self.purge_expired().await?;

        let id = Self::generate_id();
        let now = Utc::now();
        let created_at = now.to_rfc3339();
        let expires_at = (now + self.ttl).to_rfc3339();

        debug!("Staging registration draft {}", id);

        sqlx::query(
            r#"
            INSERT INTO registration_drafts (id, first_name, last_name, email, created_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.email)
        .bind(&created_at)
        .bind(&expires_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert registration draft")?;

        Ok(RegistrationDraft {
            id,
            first_name: profile.first_name,
            last_name: profile.last_name,
            email: profile.email,
            created_at,
            expires_at,
        })
    }

    /// Atomically consume a draft: the row is read and deleted in one
    /// pass, so exactly one concurrent completion wins. Returns `None`
    /// for an unknown, already-consumed, or expired draft.
    #[instrument(skip(self))]
    pub async fn consume(&self, id: &str) -> Result<Option<RegistrationDraft>> {
        let now = Utc::now().to_rfc3339();

        let draft = sqlx::query_as::<_, RegistrationDraft>(
            r#"
            DELETE FROM registration_drafts
            WHERE id = ? AND expires_at > ?
            RETURNING id, first_name, last_name, email, created_at, expires_at
            "#,
        )
        .bind(id)
        .bind(&now)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to consume registration draft")?;

        Ok(draft)
    }

    /// Delete drafts past their expiry.
    #[instrument(skip(self))]
    pub async fn purge_expired(&self) -> Result<u64> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query("DELETE FROM registration_drafts WHERE expires_at <= ?")
            .bind(&now)
            .execute(&self.pool)
            .await
            .context("Failed to purge expired registration drafts")?;

        Ok(result.rows_affected())
    }
}
