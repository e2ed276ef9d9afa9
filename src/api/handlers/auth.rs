//! Authentication and registration handlers.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::auth::CurrentUser;
use crate::user::{CreateUserRequest, StartRegistration, UserInfo};

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;

/// Cookie carrying the staged registration draft ID between the two
/// registration steps.
const DRAFT_COOKIE: &str = "reg_draft";

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserInfo,
}

/// Build the auth cookie with security flags.
///
/// In dev mode, omit Secure flag to allow http://localhost.
/// In production, always include Secure flag.
fn auth_cookie(state: &AppState, token: &str) -> String {
    let secure_flag = if state.auth.is_dev_mode() {
        ""
    } else {
        " Secure;"
    };
    format!(
        "auth_token={}; Path=/; HttpOnly; SameSite=Lax;{} Max-Age={}",
        token,
        secure_flag,
        state.auth.token_ttl_seconds()
    )
}

/// Login endpoint.
#[instrument(skip(state, request), fields(username = %request.username))]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .users
        .verify_credentials(&request.username, &request.password)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid username or password"))?;

    let token = state
        .auth
        .generate_token(&user.id, &user.email, &user.display_name())?;
    let cookie = auth_cookie(&state, &token);

    info!(user_id = %user.id, "User logged in successfully");

    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(LoginResponse {
            token,
            user: user.into(),
        }),
    ))
}

/// Logout endpoint (clears auth cookie).
pub async fn logout() -> impl IntoResponse {
    // Clear the auth cookie by setting it to empty with immediate expiry
    let cookie = "auth_token=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0";

    (
        AppendHeaders([(SET_COOKIE, cookie.to_string())]),
        StatusCode::NO_CONTENT,
    )
}

/// Response for the first registration step.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub draft_id: String,
    pub expires_at: String,
}

/// First registration step: stage the caller's profile as a draft and
/// hand the draft ID back as a short-lived cookie.
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<StartRegistration>,
) -> ApiResult<impl IntoResponse> {
    if request.first_name.trim().is_empty() || request.last_name.trim().is_empty() {
        return Err(ApiError::bad_request("First and last name are required."));
    }
    // Reject bad emails here, before a draft is staged; the completion
    // step consumes the draft and a rejection there would burn it.
    let email_parts: Vec<&str> = request.email.split('@').collect();
    if email_parts.len() != 2 || email_parts[0].is_empty() || !email_parts[1].contains('.') {
        return Err(ApiError::bad_request("Invalid email format."));
    }

    let draft = state.drafts.create(request).await?;

    let max_age = chrono::DateTime::parse_from_rfc3339(&draft.expires_at)
        .map(|expiry| (expiry.timestamp() - chrono::Utc::now().timestamp()).max(0))
        .unwrap_or(0);
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        DRAFT_COOKIE, draft.id, max_age
    );

    info!(draft_id = %draft.id, "Staged registration draft");

    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(RegisterResponse {
            draft_id: draft.id,
            expires_at: draft.expires_at,
        }),
    ))
}

/// Credentials for the second registration step.
#[derive(Debug, Deserialize)]
pub struct CompleteRegistrationRequest {
    pub username: String,
    pub password: String,
    /// Draft ID, for clients that do not carry the cookie.
    pub draft_id: Option<String>,
}

/// Registration completion response.
#[derive(Debug, Serialize)]
pub struct CompleteRegistrationResponse {
    pub token: String,
    pub user: UserInfo,
}

/// Second registration step: consume the draft and create the account.
///
/// The draft is consumed atomically, so when two tabs race to complete
/// the same registration exactly one wins; the loser gets a 400.
#[instrument(skip(state, headers, request), fields(username = %request.username))]
pub async fn complete_registration(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CompleteRegistrationRequest>,
) -> ApiResult<impl IntoResponse> {
    let draft_id = request
        .draft_id
        .clone()
        .or_else(|| draft_cookie_value(&headers))
        .ok_or_else(|| ApiError::bad_request("No registration in progress."))?;

    let draft = state
        .drafts
        .consume(&draft_id)
        .await?
        .ok_or_else(|| ApiError::bad_request("Registration draft not found or expired."))?;

    let user = state
        .users
        .create_user(CreateUserRequest {
            username: request.username,
            email: draft.email,
            password: request.password,
            first_name: draft.first_name,
            last_name: draft.last_name,
        })
        .await?;

    let token = state
        .auth
        .generate_token(&user.id, &user.email, &user.display_name())?;

    let auth = auth_cookie(&state, &token);
    let clear_draft = format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", DRAFT_COOKIE);

    info!(user_id = %user.id, username = %user.username, "User registered successfully");

    Ok((
        StatusCode::CREATED,
        AppendHeaders([(SET_COOKIE, auth), (SET_COOKIE, clear_draft)]),
        Json(CompleteRegistrationResponse {
            token,
            user: user.into(),
        }),
    ))
}

/// Get current user profile.
#[instrument(skip(state, user))]
pub async fn get_me(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<UserInfo>> {
    let db_user = state
        .users
        .get_user(user.id())
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(db_user.into()))
}

/// Pull the registration draft ID out of the request cookies.
fn draft_cookie_value(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    crate::auth::cookie_value(cookies, DRAFT_COOKIE).map(str::to_string)
}
