//! Message data models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Message entity from database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: i64,
    pub author_id: String,
    pub body: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Message joined with its author's derived display name, the shape
/// returned by full fetches and searches.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MessageWithAuthor {
    pub id: i64,
    pub author_id: String,
    pub author_name: String,
    pub body: String,
    pub created_at: String,
    pub updated_at: String,
}
