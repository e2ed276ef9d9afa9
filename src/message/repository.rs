//! Repository for message database operations.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::instrument;

use super::models::{Message, MessageWithAuthor};

const JOINED_COLUMNS: &str = "m.id, m.author_id, \
     u.first_name || ' ' || u.last_name AS author_name, \
     m.body, m.created_at, m.updated_at";

/// Repository for message database operations.
#[derive(Debug, Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    /// Create a new message repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a message.
    #[instrument(skip(self, body))]
    pub async fn create(&self, author_id: &str, body: &str) -> Result<Message> {
        let now = Utc::now().to_rfc3339();

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO messages (author_id, body, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(author_id)
        .bind(body)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await
        .context("inserting message")?;

        self.get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Message not found after creation"))
    }

    /// Get a message by ID.
    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<Option<Message>> {
        sqlx::query_as::<_, Message>(
            "SELECT id, author_id, body, created_at, updated_at FROM messages WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("fetching message")
    }

    /// All messages with author display names, in insertion order.
    #[instrument(skip(self))]
    pub async fn list_with_authors(&self) -> Result<Vec<MessageWithAuthor>> {
        sqlx::query_as::<_, MessageWithAuthor>(&format!(
            r#"
            SELECT {JOINED_COLUMNS}
            FROM messages m
            JOIN users u ON u.id = m.author_id
            ORDER BY m.id ASC
            "#
        ))
        .fetch_all(&self.pool)
        .await
        .context("listing messages")
    }

    /// Messages whose body contains the query, case-insensitively, in
    /// insertion order.
    #[instrument(skip(self))]
    pub async fn search_with_authors(&self, query: &str) -> Result<Vec<MessageWithAuthor>> {
        let pattern = format!("%{}%", query.to_lowercase());

        sqlx::query_as::<_, MessageWithAuthor>(&format!(
            r#"
            SELECT {JOINED_COLUMNS}
            FROM messages m
            JOIN users u ON u.id = m.author_id
            WHERE LOWER(m.body) LIKE ?
            ORDER BY m.id ASC
            "#
        ))
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await
        .context("searching messages")
    }

    /// Update a message body, gated on ownership.
    #[instrument(skip(self, body))]
    pub async fn update(&self, id: i64, author_id: &str, body: &str) -> Result<u64> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            "UPDATE messages SET body = ?, updated_at = ? WHERE id = ? AND author_id = ?",
        )
        .bind(body)
        .bind(&now)
        .bind(id)
        .bind(author_id)
        .execute(&self.pool)
        .await
        .context("updating message")?;

        Ok(result.rows_affected())
    }

    /// Delete a message, gated on ownership.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64, author_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM messages WHERE id = ? AND author_id = ?")
            .bind(id)
            .bind(author_id)
            .execute(&self.pool)
            .await
            .context("deleting message")?;

        Ok(result.rows_affected())
    }

    /// Count total messages.
    #[instrument(skip(self))]
    pub async fn count(&self) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await
            .context("counting messages")
    }
}
