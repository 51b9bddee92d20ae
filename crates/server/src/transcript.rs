//! Transcript lookup against the call-intelligence provider's API.
//!
//! Used only when a webhook arrives without an inline transcript.

use async_trait::async_trait;
use callbrief_core::config::ProviderConfig;
use callbrief_core::domain::webhook::TranscriptSegment;
use callbrief_core::Transcript;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("transcript request failed: {0}")]
    Transport(String),
    #[error("provider rejected the transcript request with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("provider returned an unreadable transcript response: {0}")]
    InvalidResponse(String),
    #[error("provider has no transcript for call `{0}`")]
    NotFound(String),
}

#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn fetch(&self, call_id: &str) -> Result<Transcript, TranscriptError>;
}

pub struct ProviderTranscriptClient {
    client: Client,
    base_url: String,
    access_key: SecretString,
    access_key_secret: SecretString,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptResponse {
    #[serde(default)]
    call_transcripts: Vec<CallTranscript>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallTranscript {
    call_id: String,
    #[serde(default)]
    transcript: Vec<TranscriptSegment>,
}

impl ProviderTranscriptClient {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        access_key: SecretString,
        access_key_secret: SecretString,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url, access_key, access_key_secret }
    }

    /// `None` unless the provider URL and both keys are configured.
    pub fn from_config(client: Client, config: &ProviderConfig) -> Option<Self> {
        let base_url = config.base_url.as_deref()?;
        let access_key = config.access_key.clone()?;
        let access_key_secret = config.access_key_secret.clone()?;
        Some(Self::new(client, base_url, access_key, access_key_secret))
    }
}

#[async_trait]
impl TranscriptSource for ProviderTranscriptClient {
    async fn fetch(&self, call_id: &str) -> Result<Transcript, TranscriptError> {
        let response = self
            .client
            .post(format!("{}/v2/calls/transcript", self.base_url))
            .basic_auth(
                self.access_key.expose_secret(),
                Some(self.access_key_secret.expose_secret()),
            )
            .json(&json!({ "filter": { "callIds": [call_id] } }))
            .send()
            .await
            .map_err(|error| TranscriptError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TranscriptError::Rejected { status: status.as_u16(), message });
        }

        let body: TranscriptResponse = response
            .json()
            .await
            .map_err(|error| TranscriptError::InvalidResponse(error.to_string()))?;

        body.call_transcripts
            .into_iter()
            .find(|entry| entry.call_id == call_id)
            .map(|entry| Transcript::new(entry.transcript))
            .ok_or_else(|| TranscriptError::NotFound(call_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Client;
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{ProviderTranscriptClient, TranscriptError, TranscriptSource};

    fn client(server: &MockServer) -> ProviderTranscriptClient {
        ProviderTranscriptClient::new(
            Client::new(),
            server.uri(),
            SecretString::from("key".to_string()),
            SecretString::from("secret".to_string()),
        )
    }

    #[tokio::test]
    async fn fetches_the_transcript_for_the_requested_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/calls/transcript"))
            // base64("key:secret")
            .and(header("authorization", "Basic a2V5OnNlY3JldA=="))
            .and(body_json(json!({ "filter": { "callIds": ["c-1"] } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "callTranscripts": [{
                    "callId": "c-1",
                    "transcript": [{
                        "speakerId": "s-1",
                        "topic": "Pricing",
                        "sentences": [{ "start": 1000, "end": 2000, "text": "Hello." }]
                    }]
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let transcript = client(&server).fetch("c-1").await.expect("transcript");
        assert_eq!(transcript.sentence_count(), 1);
        assert!(transcript.has_content());
    }

    #[tokio::test]
    async fn missing_call_entry_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/calls/transcript"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "callTranscripts": [] })),
            )
            .mount(&server)
            .await;

        let error = client(&server).fetch("c-1").await.expect_err("no transcript");
        assert_eq!(error, TranscriptError::NotFound("c-1".to_string()));
    }

    #[tokio::test]
    async fn provider_errors_are_reported_with_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/calls/transcript"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
            .mount(&server)
            .await;

        let error = client(&server).fetch("c-1").await.expect_err("unauthorized");
        assert_eq!(
            error,
            TranscriptError::Rejected { status: 401, message: "bad credentials".to_string() }
        );
    }
}
