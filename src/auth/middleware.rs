//! JWT validation middleware and token issuance.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use tracing::warn;

use super::claims::Claims;
use super::config::AuthConfig;
use super::error::AuthError;

/// Cookie that carries the auth token for browser clients.
pub const AUTH_COOKIE: &str = "auth_token";

/// Shared authentication state: config plus the resolved signing secret.
#[derive(Clone)]
pub struct AuthState {
    config: Arc<AuthConfig>,
    secret: Arc<String>,
}

impl AuthState {
    /// Create auth state from validated configuration.
    ///
    /// In dev mode without a configured secret an ephemeral one is
    /// generated, so tokens do not survive a restart.
    pub fn new(config: AuthConfig) -> Self {
        let secret = match &config.jwt_secret {
            Some(secret) => secret.clone(),
            None => {
                warn!("No jwt_secret configured; using an ephemeral dev secret");
                nanoid::nanoid!(48)
            }
        };

        Self {
            config: Arc::new(config),
            secret: Arc::new(secret),
        }
    }

    /// Generate a signed token for a user.
    pub fn generate_token(
        &self,
        user_id: &str,
        email: &str,
        display_name: &str,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (now + chrono::Duration::hours(self.config.token_ttl_hours)).timestamp(),
            iat: Some(now.timestamp()),
            email: Some(email.to_string()),
            name: Some(display_name.to_string()),
        };

        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AuthError::Internal(format!("signing token: {e}")))
    }

    /// Verify a token and return its claims.
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let decoded = jsonwebtoken::decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken(e.to_string()),
        })?;

        Ok(decoded.claims)
    }

    /// Token lifetime in seconds, for cookie Max-Age.
    pub fn token_ttl_seconds(&self) -> i64 {
        self.config.token_ttl_hours * 60 * 60
    }

    /// Whether dev mode is enabled.
    pub fn is_dev_mode(&self) -> bool {
        self.config.dev_mode
    }

    /// Configured CORS origins.
    pub fn allowed_origins(&self) -> &[String] {
        &self.config.allowed_origins
    }
}

/// Authenticated caller, injected into request extensions by the
/// middleware and extracted by protected handlers.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub claims: Claims,
}

impl CurrentUser {
    /// The caller's user ID.
    pub fn id(&self) -> &str {
        &self.claims.sub
    }

    /// The caller's display name.
    pub fn display_name(&self) -> &str {
        self.claims.display_name()
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AuthError::MissingAuthHeader)
    }
}

/// Middleware guarding protected routes.
///
/// Validates the caller's token before any handler logic runs and injects
/// [`CurrentUser`] into the request.
pub async fn auth_middleware(
    State(auth): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = extract_token(request.headers())?;
    let claims = auth.verify_token(&token)?;

    request.extensions_mut().insert(CurrentUser { claims });

    Ok(next.run(request).await)
}

/// Pull the token from the Authorization header or the auth cookie.
fn extract_token(headers: &HeaderMap) -> Result<String, AuthError> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        let value = value.to_str().map_err(|_| AuthError::InvalidAuthHeader)?;
        return value
            .strip_prefix("Bearer ")
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::InvalidAuthHeader);
    }

    if let Some(cookie_header) = headers.get(header::COOKIE) {
        let cookies = cookie_header
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;
        if let Some(token) = cookie_value(cookies, AUTH_COOKIE) {
            if !token.is_empty() {
                return Ok(token.to_string());
            }
        }
    }

    Err(AuthError::MissingAuthHeader)
}

/// Find a cookie value in a Cookie header.
pub fn cookie_value<'a>(cookies: &'a str, name: &str) -> Option<&'a str> {
    cookies.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then_some(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn test_state() -> AuthState {
        AuthState::new(AuthConfig {
            jwt_secret: Some("test-secret-for-auth-unit-tests-32-chars!".to_string()),
            dev_mode: true,
            ..Default::default()
        })
    }

    #[test]
    fn test_token_round_trip() {
        let auth = test_state();
        let token = auth
            .generate_token("usr_1", "ada@example.com", "Ada Lovelace")
            .unwrap();
        let claims = auth.verify_token(&token).unwrap();

        assert_eq!(claims.sub, "usr_1");
        assert_eq!(claims.email.as_deref(), Some("ada@example.com"));
        assert_eq!(claims.display_name(), "Ada Lovelace");
    }

    #[test]
    fn test_verify_rejects_tampered_token() {
        let auth = test_state();
        let other = AuthState::new(AuthConfig {
            jwt_secret: Some("a-completely-different-secret-of-32-chars".to_string()),
            dev_mode: true,
            ..Default::default()
        });

        let token = other.generate_token("usr_1", "a@b.com", "A B").unwrap();
        assert!(matches!(
            auth.verify_token(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_extract_token_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc123"),
        );
        assert_eq!(extract_token(&headers).unwrap(), "abc123");
    }

    #[test]
    fn test_extract_token_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; auth_token=tok456; lang=en"),
        );
        assert_eq!(extract_token(&headers).unwrap(), "tok456");
    }

    #[test]
    fn test_extract_token_missing() {
        let headers = HeaderMap::new();
        assert!(matches!(
            extract_token(&headers),
            Err(AuthError::MissingAuthHeader)
        ));
    }

    #[test]
    fn test_cookie_value() {
        assert_eq!(cookie_value("a=1; b=2", "b"), Some("2"));
        assert_eq!(cookie_value("a=1; b=2", "c"), None);
    }
}
