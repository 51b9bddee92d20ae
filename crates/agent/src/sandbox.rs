//! Client for the remote sandbox service that hosts the call files.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SandboxSession {
    pub id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SandboxFile {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("sandbox request failed: {0}")]
    Transport(String),
    #[error("sandbox rejected the request with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("sandbox returned an unexpected response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for SandboxError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(error.to_string())
    }
}

#[async_trait]
pub trait SandboxClient: Send + Sync {
    /// Starts a session that the platform tears down after `timeout`.
    async fn create_session(&self, timeout: Duration) -> Result<SandboxSession, SandboxError>;

    async fn make_dir(&self, session: &SandboxSession, path: &str) -> Result<(), SandboxError>;

    async fn write_files(
        &self,
        session: &SandboxSession,
        files: &[SandboxFile],
    ) -> Result<(), SandboxError>;
}

#[derive(Clone)]
pub struct HttpSandboxClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

#[derive(Deserialize)]
struct CreatedSession {
    id: String,
}

impl HttpSandboxClient {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: SecretString) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url, api_key }
    }

    async fn post(&self, path: &str, body: Value) -> Result<reqwest::Response, SandboxError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = rejection_message(status, response.text().await.unwrap_or_default());
        Err(SandboxError::Rejected { status: status.as_u16(), message })
    }
}

#[async_trait]
impl SandboxClient for HttpSandboxClient {
    async fn create_session(&self, timeout: Duration) -> Result<SandboxSession, SandboxError> {
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let response = self.post("/v1/sandboxes", json!({ "timeoutMs": timeout_ms })).await?;

        let created: CreatedSession = response
            .json()
            .await
            .map_err(|error| SandboxError::InvalidResponse(error.to_string()))?;
        if created.id.trim().is_empty() {
            return Err(SandboxError::InvalidResponse("session id is empty".to_string()));
        }

        Ok(SandboxSession { id: created.id })
    }

    async fn make_dir(&self, session: &SandboxSession, path: &str) -> Result<(), SandboxError> {
        let route = format!("/v1/sandboxes/{}/directories", session.id);
        self.post(&route, json!({ "path": path })).await.map(|_| ())
    }

    async fn write_files(
        &self,
        session: &SandboxSession,
        files: &[SandboxFile],
    ) -> Result<(), SandboxError> {
        let route = format!("/v1/sandboxes/{}/files", session.id);
        self.post(&route, json!({ "files": files })).await.map(|_| ())
    }
}

fn rejection_message(status: StatusCode, body: String) -> String {
    let from_json = serde_json::from_str::<Value>(&body).ok().and_then(|value| {
        value
            .pointer("/error/message")
            .or_else(|| value.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });

    match from_json {
        Some(message) => message,
        None if body.trim().is_empty() => {
            status.canonical_reason().unwrap_or("no response body").to_string()
        }
        None => body.trim().to_string(),
    }
}
