//! Authenticated HTTP access to the Chatwoot REST API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

pub use reqwest::Method;

use crate::config::CredentialsConfig;
use crate::error::NodeError;

/// One request/response exchange with the Chatwoot API.
///
/// Implementations make exactly one attempt per call; errors are surfaced as
/// [`NodeError::Api`] so callers can classify them.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        query: &[(String, String)],
    ) -> Result<Value>;

    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<Value> {
        self.request(Method::GET, path, None, query).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        self.request(Method::POST, path, Some(body), &[]).await
    }

    async fn put(&self, path: &str, body: Value) -> Result<Value> {
        self.request(Method::PUT, path, Some(body), &[]).await
    }

    async fn patch(&self, path: &str, body: Value) -> Result<Value> {
        self.request(Method::PATCH, path, Some(body), &[]).await
    }

    async fn delete(&self, path: &str) -> Result<Value> {
        self.request(Method::DELETE, path, None, &[]).await
    }
}

/// `/api/v1/accounts/{account_id}/{suffix}`; an empty suffix addresses the account itself.
pub fn account_path(account_id: &str, suffix: &str) -> String {
    let suffix = suffix.trim_start_matches('/');
    if suffix.is_empty() {
        format!("/api/v1/accounts/{}", account_id)
    } else {
        format!("/api/v1/accounts/{}/{}", account_id, suffix)
    }
}

/// Chatwoot account API client using a personal access token.
pub struct ChatwootClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl std::fmt::Debug for ChatwootClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatwootClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ChatwootClient {
    pub fn new(base_url: &str, access_token: &str) -> Result<Self> {
        if base_url.trim().is_empty() {
            return Err(NodeError::configuration("Chatwoot base URL is empty").into());
        }
        if access_token.trim().is_empty() {
            return Err(NodeError::configuration("Chatwoot access token is empty").into());
        }

        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        })
    }

    pub fn from_credentials(credentials: &CredentialsConfig) -> Result<Self> {
        Self::new(&credentials.base_url, &credentials.access_token)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl Transport for ChatwootClient {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        query: &[(String, String)],
    ) -> Result<Value> {
        tracing::debug!("{} {}", method, path);

        let mut request = self
            .client
            .request(method.clone(), self.url(path))
            .header("api_access_token", &self.access_token)
            .header("Accept", "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body.filter(|b| !is_empty_body(b)) {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NodeError::Api {
                status: None,
                message: e.to_string(),
            })
            .with_context(|| format!("{} {} failed", method, path))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| NodeError::Api {
                status: Some(status.as_u16()),
                message: e.to_string(),
            })
            .with_context(|| format!("Failed to read {} {} response", method, path))?;

        if !status.is_success() {
            let err = NodeError::Api {
                status: Some(status.as_u16()),
                message: api_error_message(&text, status),
            };
            return Err(anyhow::Error::new(err).context(format!("{} {} failed", method, path)));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text)
            .map_err(|e| NodeError::Api {
                status: Some(status.as_u16()),
                message: format!("invalid JSON response: {}", e),
            })
            .with_context(|| format!("Failed to parse {} {} response", method, path))
    }
}

fn is_empty_body(body: &Value) -> bool {
    match body {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Pulls the human-readable message out of a Chatwoot error body.
fn api_error_message(body: &str, status: reqwest::StatusCode) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error"] {
            if let Some(msg) = json.get(key).and_then(Value::as_str) {
                return msg.to_string();
            }
        }
        if let Some(errors) = json.get("errors").and_then(Value::as_array) {
            let joined = errors
                .iter()
                .map(|e| match e {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", ");
            if !joined.is_empty() {
                return joined;
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    } else {
        trimmed.to_string()
    }
}
