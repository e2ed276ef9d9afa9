//! User management module.
//!
//! Provides user CRUD operations, credential verification, and the staged
//! two-step registration flow.

mod drafts;
mod models;
mod repository;
mod service;

pub use drafts::{RegistrationDraft, RegistrationDraftRepository, StartRegistration};
pub use models::{CreateUserRequest, UpdateUserRequest, User, UserInfo};
pub use repository::UserRepository;
pub use service::UserService;
