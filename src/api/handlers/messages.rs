//! Message handlers: CRUD, search, and the polling check.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use crate::auth::CurrentUser;
use crate::freshness::{LAST_UPDATE_HEADER, UpdateCheck, parse_cursor};
use crate::message::{Message, MessageWithAuthor};

use crate::api::error::ApiResult;
use crate::api::state::AppState;

/// Request body for creating or editing a message.
#[derive(Debug, Deserialize)]
pub struct MessageBody {
    pub text: String,
}

/// Query for message search.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

/// Full fetch: all messages with author display names, in insertion order.
#[instrument(skip(state, _user))]
pub async fn list_messages(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> ApiResult<Json<Vec<MessageWithAuthor>>> {
    let messages = state.messages.list_messages().await?;
    Ok(Json(messages))
}

/// Case-insensitive substring search. One-shot: does not interact with
/// the polling protocol.
#[instrument(skip(state, _user))]
pub async fn search_messages(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<MessageWithAuthor>>> {
    let messages = state.messages.search_messages(&query.q).await?;
    Ok(Json(messages))
}

/// Poll check: compare the client's cursor against the watermark.
///
/// The session is validated by the auth middleware before this runs. The
/// check itself is read-only: it never advances the watermark. A missing
/// or unparsable `Last-Update` header falls back to the epoch so the
/// client is told to refetch rather than silently miss updates.
#[instrument(skip(state, _user, headers))]
pub async fn check_updates(
    State(state): State<AppState>,
    _user: CurrentUser,
    headers: HeaderMap,
) -> ApiResult<Json<UpdateCheck>> {
    let cursor = parse_cursor(
        headers
            .get(LAST_UPDATE_HEADER)
            .and_then(|value| value.to_str().ok()),
    );

    Ok(Json(UpdateCheck {
        has_updates: state.watermark.has_changed_since(cursor),
        last_check: Utc::now(),
    }))
}

/// Create a message.
#[instrument(skip(state, user, request))]
pub async fn create_message(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<MessageBody>,
) -> ApiResult<impl IntoResponse> {
    let message = state.messages.create_message(user.id(), &request.text).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Edit a message. Owner only.
#[instrument(skip(state, user, request))]
pub async fn update_message(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(request): Json<MessageBody>,
) -> ApiResult<Json<Message>> {
    let message = state
        .messages
        .update_message(id, user.id(), &request.text)
        .await?;
    Ok(Json(message))
}

/// Delete a message. Owner only.
#[instrument(skip(state, user))]
pub async fn delete_message(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.messages.delete_message(id, user.id()).await?;
    Ok(StatusCode::NO_CONTENT)
}
