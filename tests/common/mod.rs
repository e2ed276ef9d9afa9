//! Test utilities and common setup.

use std::sync::Arc;

use axum::Router;
use palaver::api::{self, AppState};
use palaver::auth::{AuthConfig, AuthState};
use palaver::db::Database;
use palaver::freshness::Watermark;
use palaver::message::{MessageRepository, MessageService};
use palaver::user::{
    CreateUserRequest, RegistrationDraftRepository, UserRepository, UserService,
};

/// Create a test AuthConfig with a JWT secret for testing.
fn test_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: Some("test-secret-for-integration-tests-minimum-32-chars".to_string()),
        dev_mode: true,
        ..Default::default()
    }
}

/// A fully wired application over an in-memory database, with the state
/// exposed so tests can seed data behind the router's back.
pub struct TestBackend {
    pub state: AppState,
    pub router: Router,
}

/// Create a test application with all services initialized.
pub async fn test_backend() -> TestBackend {
    // Use in-memory database for tests
    let db = Database::in_memory().await.unwrap();

    // Create auth state in dev mode with JWT secret
    let auth_state = AuthState::new(test_auth_config());

    // Process-wide watermark, stamped at startup
    let watermark = Arc::new(Watermark::new());

    // Create services
    let user_service = UserService::new(UserRepository::new(db.pool().clone()));
    let message_service = MessageService::new(
        MessageRepository::new(db.pool().clone()),
        Arc::clone(&watermark),
    );
    let draft_repo =
        RegistrationDraftRepository::new(db.pool().clone(), chrono::Duration::minutes(30));

    let state = AppState::new(
        user_service,
        message_service,
        draft_repo,
        auth_state,
        watermark,
    );
    let router = api::create_router(state.clone());

    TestBackend { state, router }
}

/// Seed a user directly through the service layer and mint a token.
/// Returns (user_id, token).
pub async fn seed_user(
    state: &AppState,
    username: &str,
    first_name: &str,
    last_name: &str,
) -> (String, String) {
    let user = state
        .users
        .create_user(CreateUserRequest {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password: "password123".to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        })
        .await
        .unwrap();

    let token = state
        .auth
        .generate_token(&user.id, &user.email, &user.display_name())
        .unwrap();

    (user.id, token)
}
