//! Chat message module.
//!
//! Messages are visible to all authenticated users; only the author may
//! edit or delete their own. Every successful mutation advances the
//! process-wide freshness watermark so polling clients pick the change up.

mod models;
mod repository;
mod service;

pub use models::{Message, MessageWithAuthor};
pub use repository::MessageRepository;
pub use service::MessageService;
