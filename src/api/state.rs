//! Application state shared across handlers.

use std::sync::Arc;

use crate::auth::AuthState;
use crate::freshness::Watermark;
use crate::message::MessageService;
use crate::user::{RegistrationDraftRepository, UserService};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// User service for account management.
    pub users: Arc<UserService>,
    /// Message service for the chatroom message set.
    pub messages: Arc<MessageService>,
    /// Staged registration drafts.
    pub drafts: Arc<RegistrationDraftRepository>,
    /// Authentication state.
    pub auth: AuthState,
    /// Freshness watermark for the polling protocol.
    pub watermark: Arc<Watermark>,
}

impl AppState {
    /// Create new application state.
    pub fn new(
        users: UserService,
        messages: MessageService,
        drafts: RegistrationDraftRepository,
        auth: AuthState,
        watermark: Arc<Watermark>,
    ) -> Self {
        Self {
            users: Arc::new(users),
            messages: Arc::new(messages),
            drafts: Arc::new(drafts),
            auth,
            watermark,
        }
    }
}
