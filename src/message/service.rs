//! Message service for business logic.

use std::sync::Arc;

use anyhow::{Result, bail};
use tracing::{info, instrument};

use crate::freshness::Watermark;

use super::models::{Message, MessageWithAuthor};
use super::repository::MessageRepository;

/// Maximum message length in characters.
const MAX_BODY_CHARS: usize = 500;

/// Service for message operations.
///
/// Owns the validation rules and the watermark side effect: every
/// successful create, update, or delete advances the watermark; a
/// rejected write leaves it untouched.
#[derive(Debug, Clone)]
pub struct MessageService {
    repo: MessageRepository,
    watermark: Arc<Watermark>,
}

impl MessageService {
    /// Create a new message service.
    pub fn new(repo: MessageRepository, watermark: Arc<Watermark>) -> Self {
        Self { repo, watermark }
    }

    /// Create a message.
    #[instrument(skip(self, body))]
    pub async fn create_message(&self, author_id: &str, body: &str) -> Result<Message> {
        let body = validate_body(body)?;

        let message = self.repo.create(author_id, body).await?;
        self.watermark.advance();
        info!(message_id = message.id, author_id = %author_id, "Created message");

        Ok(message)
    }

    /// All messages with author display names, in insertion order.
    #[instrument(skip(self))]
    pub async fn list_messages(&self) -> Result<Vec<MessageWithAuthor>> {
        self.repo.list_with_authors().await
    }

    /// Case-insensitive substring search over message bodies.
    #[instrument(skip(self))]
    pub async fn search_messages(&self, query: &str) -> Result<Vec<MessageWithAuthor>> {
        self.repo.search_with_authors(query.trim()).await
    }

    /// Edit a message body. Only the author may edit.
    #[instrument(skip(self, body))]
    pub async fn update_message(&self, id: i64, author_id: &str, body: &str) -> Result<Message> {
        let body = validate_body(body)?;

        let Some(existing) = self.repo.get(id).await? else {
            bail!("Message not found: {}", id);
        };
        if existing.author_id != author_id {
            bail!("Forbidden: only the author may edit a message.");
        }

        self.repo.update(id, author_id, body).await?;
        self.watermark.advance();
        info!(message_id = id, author_id = %author_id, "Updated message");

        self.repo
            .get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Message not found after update"))
    }

    /// Delete a message. Only the author may delete.
    #[instrument(skip(self))]
    pub async fn delete_message(&self, id: i64, author_id: &str) -> Result<()> {
        let Some(existing) = self.repo.get(id).await? else {
            bail!("Message not found: {}", id);
        };
        if existing.author_id != author_id {
            bail!("Forbidden: only the author may delete a message.");
        }

        self.repo.delete(id, author_id).await?;
        self.watermark.advance();
        info!(message_id = id, author_id = %author_id, "Deleted message");

        Ok(())
    }
}

/// Validate a message body: 1-500 characters after trimming.
fn validate_body(body: &str) -> Result<&str> {
    let trimmed = body.trim();
    let chars = trimmed.chars().count();
    if chars == 0 || chars > MAX_BODY_CHARS {
        bail!("Message text must be 1-{} characters.", MAX_BODY_CHARS);
    }
    Ok(trimmed)
}
