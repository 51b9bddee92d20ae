//! Client for the hosted tool-loop runtime.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use thiserror::Error;

use crate::invocation::AgentInvocation;

const RUNS_PATH: &str = "/v1/agent/runs";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InvocationError {
    #[error("agent runtime request failed: {0}")]
    Transport(String),
    #[error("agent runtime returned {status} ({kind}): {message}")]
    Platform { status: u16, kind: String, message: String },
    #[error("agent output did not satisfy the output schema: {0}")]
    SchemaValidation(String),
    #[error("agent runtime response could not be interpreted: {0}")]
    MalformedResponse(String),
}

#[async_trait]
pub trait ToolLoopClient: Send + Sync {
    /// Runs the loop to completion and returns the raw structured output.
    async fn run(&self, invocation: &AgentInvocation) -> Result<Value, InvocationError>;
}

#[derive(Clone)]
pub struct HttpToolLoopClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl HttpToolLoopClient {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: SecretString) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url, api_key }
    }
}

#[async_trait]
impl ToolLoopClient for HttpToolLoopClient {
    async fn run(&self, invocation: &AgentInvocation) -> Result<Value, InvocationError> {
        let response = self
            .client
            .post(format!("{}{RUNS_PATH}", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(invocation)
            .send()
            .await
            .map_err(|error| InvocationError::Transport(error.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InvocationError::Transport(error.to_string()))?;

        interpret_response(status, &body)
    }
}

/// Maps a runtime response onto the output value or a typed failure.
pub fn interpret_response(status: StatusCode, body: &str) -> Result<Value, InvocationError> {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return Err(InvocationError::MalformedResponse(format!(
            "status {} with a non-JSON body",
            status.as_u16()
        )));
    };

    let run_status = value.get("status").and_then(Value::as_str);

    if run_status == Some("output_validation_failed")
        && (status.is_success() || status == StatusCode::UNPROCESSABLE_ENTITY)
    {
        return Err(InvocationError::SchemaValidation(error_message(&value)));
    }

    if !status.is_success() {
        return match value.get("error").filter(|error| error.is_object()) {
            Some(error) => Err(InvocationError::Platform {
                status: status.as_u16(),
                kind: error
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
                message: error_message(&value),
            }),
            None => Err(InvocationError::MalformedResponse(format!(
                "status {} without an error object",
                status.as_u16()
            ))),
        };
    }

    match run_status {
        Some("completed") => match value.get("output") {
            Some(output) if output.is_object() => Ok(output.clone()),
            Some(_) => Err(InvocationError::MalformedResponse(
                "completed run output is not an object".to_string(),
            )),
            None => Err(InvocationError::MalformedResponse(
                "completed run has no output".to_string(),
            )),
        },
        Some(other) => {
            Err(InvocationError::MalformedResponse(format!("unexpected run status `{other}`")))
        }
        None => Err(InvocationError::MalformedResponse("run status is missing".to_string())),
    }
}

fn error_message(value: &Value) -> String {
    value
        .pointer("/error/message")
        .and_then(Value::as_str)
        .unwrap_or("no message")
        .to_string()
}

#[cfg(test)]
mod tests {
    use reqwest::{Client, StatusCode};
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{interpret_response, HttpToolLoopClient, InvocationError, ToolLoopClient};
    use crate::invocation::{AgentInvocation, InvocationInput, SandboxBinding};
    use crate::schema::output_schema;
    use crate::tools::ToolSet;
    use callbrief_core::WebhookPayload;

    fn invocation() -> AgentInvocation {
        AgentInvocation {
            model: "anthropic/claude-sonnet-4.5".to_string(),
            provider_options: json!({}),
            instructions: "Summarize the call.".to_string(),
            tools: ToolSet::sandbox_defaults().definitions(),
            output_schema: output_schema(),
            input: InvocationInput {
                webhook: WebhookPayload::from_slice(br#"{"callData":{"metaData":{"id":"c-1"}}}"#)
                    .expect("valid"),
                crm_account_id: Some("001A".to_string()),
            },
            sandbox: SandboxBinding {
                session_id: "sbx-1".to_string(),
                workdir: "/workspace".to_string(),
            },
            max_steps: 30,
        }
    }

    #[tokio::test]
    async fn completed_run_returns_the_output_object() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/agent/runs"))
            .and(header("authorization", "Bearer agent-key"))
            .and(body_partial_json(json!({
                "model": "anthropic/claude-sonnet-4.5",
                "sandbox": { "sessionId": "sbx-1" },
                "input": { "crmAccountId": "001A" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "completed",
                "output": { "summary": "ok" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpToolLoopClient::new(
            Client::new(),
            format!("{}/", server.uri()),
            SecretString::from("agent-key".to_string()),
        );
        let output = client.run(&invocation()).await.expect("completed");
        assert_eq!(output, json!({ "summary": "ok" }));
    }

    #[test]
    fn validation_failure_is_a_schema_error_on_200_and_422() {
        let body = r#"{"status":"output_validation_failed","error":{"message":"keyPoints missing"}}"#;
        for status in [StatusCode::OK, StatusCode::UNPROCESSABLE_ENTITY] {
            assert_eq!(
                interpret_response(status, body),
                Err(InvocationError::SchemaValidation("keyPoints missing".to_string()))
            );
        }
    }

    #[test]
    fn error_object_on_failure_status_is_a_platform_error() {
        let body = r#"{"error":{"type":"rate_limited","message":"slow down"}}"#;
        assert_eq!(
            interpret_response(StatusCode::TOO_MANY_REQUESTS, body),
            Err(InvocationError::Platform {
                status: 429,
                kind: "rate_limited".to_string(),
                message: "slow down".to_string(),
            })
        );
    }

    #[test]
    fn uninterpretable_bodies_are_malformed() {
        let cases = [
            (StatusCode::OK, "<html>gateway</html>"),
            (StatusCode::OK, r#"{"status":"completed"}"#),
            (StatusCode::OK, r#"{"status":"paused","output":{}}"#),
            (StatusCode::OK, r#"{"output":{}}"#),
            (StatusCode::BAD_GATEWAY, r#"{"detail":"upstream"}"#),
        ];

        for (status, body) in cases {
            let result = interpret_response(status, body);
            assert!(matches!(result, Err(InvocationError::MalformedResponse(_))), "{status} {body}");
        }
    }
}
