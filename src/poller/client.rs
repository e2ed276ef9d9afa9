//! Typed HTTP client for the chatroom API.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::freshness::{LAST_UPDATE_HEADER, UpdateCheck, format_cursor};
use crate::message::{Message, MessageWithAuthor};

/// Errors surfaced by [`ChatClient`] calls.
///
/// Authentication failures are split out because the poller treats them
/// as a hard exit from the protocol, unlike transient transport errors
/// which are retried on the next cycle.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("session is no longer authenticated")]
    Unauthorized,

    #[error("server rejected request ({status}): {message}")]
    Rejected { status: StatusCode, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Error body returned by the server.
#[derive(Debug, Deserialize)]
struct ServerError {
    error: String,
}

/// HTTP client holding a session token for the chatroom API.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

/// Login response subset the client needs.
#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

impl ChatClient {
    /// Create a client with an existing token.
    pub fn with_token(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: normalize_base_url(base_url.into()),
            token: token.into(),
        }
    }

    /// Log in with credentials and return an authenticated client.
    pub async fn login(
        base_url: impl Into<String>,
        username: &str,
        password: &str,
    ) -> Result<Self, ClientError> {
        let base_url = normalize_base_url(base_url.into());
        let http = reqwest::Client::new();

        let response = http
            .post(format!("{base_url}/auth/login"))
            .json(&serde_json::json!({
                "username": username,
                "password": password,
            }))
            .send()
            .await?;

        let login: LoginResponse = deserialize_response(response).await?;

        Ok(Self {
            http,
            base_url,
            token: login.token,
        })
    }

    /// The token this client authenticates with.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Poll check: ask whether the message set changed since the cursor.
    ///
    /// `None` means "no cursor yet"; the header is omitted and the server
    /// falls back to the epoch.
    pub async fn check_updates(
        &self,
        cursor: Option<DateTime<Utc>>,
    ) -> Result<UpdateCheck, ClientError> {
        let mut request = self
            .http
            .get(format!("{}/messages/updates", self.base_url))
            .bearer_auth(&self.token);

        if let Some(cursor) = cursor {
            request = request.header(LAST_UPDATE_HEADER, format_cursor(cursor));
        }

        deserialize_response(request.send().await?).await
    }

    /// Full fetch of the message set.
    pub async fn fetch_messages(&self) -> Result<Vec<MessageWithAuthor>, ClientError> {
        let response = self
            .http
            .get(format!("{}/messages", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?;

        deserialize_response(response).await
    }

    /// Case-insensitive substring search.
    pub async fn search_messages(
        &self,
        query: &str,
    ) -> Result<Vec<MessageWithAuthor>, ClientError> {
        let response = self
            .http
            .get(format!("{}/messages/search", self.base_url))
            .query(&[("q", query)])
            .bearer_auth(&self.token)
            .send()
            .await?;

        deserialize_response(response).await
    }

    /// Create a message.
    pub async fn send_message(&self, text: &str) -> Result<Message, ClientError> {
        let response = self
            .http
            .post(format!("{}/messages", self.base_url))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;

        deserialize_response(response).await
    }

    /// Edit a message.
    pub async fn edit_message(&self, id: i64, text: &str) -> Result<Message, ClientError> {
        let response = self
            .http
            .put(format!("{}/messages/{id}", self.base_url))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;

        deserialize_response(response).await
    }

    /// Delete a message.
    pub async fn delete_message(&self, id: i64) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(format!("{}/messages/{id}", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }
}

fn normalize_base_url(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

/// Map error statuses onto [`ClientError`], pulling the server's error
/// message out of the body when there is one.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::UNAUTHORIZED {
        return Err(ClientError::Unauthorized);
    }

    let message = match response.json::<ServerError>().await {
        Ok(body) => body.error,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    };

    Err(ClientError::Rejected { status, message })
}

async fn deserialize_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    let response = check_status(response).await?;
    Ok(response.json::<T>().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("http://localhost:8080/".to_string()),
            "http://localhost:8080"
        );
        assert_eq!(
            normalize_base_url("http://localhost:8080".to_string()),
            "http://localhost:8080"
        );
    }
}
