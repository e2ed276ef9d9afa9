//! Authentication errors.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Errors raised while authenticating a request.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing authorization")]
    MissingAuthHeader,

    #[error("malformed authorization header")]
    InvalidAuthHeader,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("authentication error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct AuthErrorBody {
    error: String,
    code: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        };
        let code = match status {
            StatusCode::UNAUTHORIZED => "UNAUTHORIZED",
            _ => "INTERNAL_ERROR",
        };

        let body = AuthErrorBody {
            error: self.to_string(),
            code,
        };

        (status, Json(body)).into_response()
    }
}
