//! Salesforce integration.
//!
//! Reads the account named by the webhook into the call context and records
//! each finished summary as a completed `Task` on that account.

use std::collections::BTreeMap;

use async_trait::async_trait;
use callbrief_core::config::CrmConfig;
use callbrief_core::{
    CrmAccountSnapshot, DispatchContext, SinkDelivery, SinkError, StructuredSummary, SummarySink,
};
use chrono::Utc;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::info;

pub const SINK_NAME: &str = "crm";

const SUBJECT_LIMIT: usize = 255;
const DESCRIPTION_LIMIT: usize = 32_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CrmError {
    #[error("crm account id `{0}` is not a valid record id")]
    InvalidAccountId(String),
    #[error("crm request failed: {0}")]
    Transport(String),
    #[error("crm rejected the request with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("crm returned an unreadable response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait CrmAccountReader: Send + Sync {
    async fn fetch_account(&self, account_id: &str) -> Result<CrmAccountSnapshot, CrmError>;
}

pub struct SalesforceClient {
    client: Client,
    instance_url: String,
    access_token: SecretString,
    api_version: String,
}

impl SalesforceClient {
    pub fn new(
        client: Client,
        instance_url: impl Into<String>,
        access_token: SecretString,
        api_version: impl Into<String>,
    ) -> Self {
        let instance_url = instance_url.into().trim_end_matches('/').to_string();
        Self { client, instance_url, access_token, api_version: api_version.into() }
    }

    /// `None` unless CRM is enabled with an instance URL and a token.
    pub fn from_config(client: Client, config: &CrmConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let instance_url = config.instance_url.as_deref()?;
        let access_token = config.access_token.clone()?;
        Some(Self::new(client, instance_url, access_token, &config.api_version))
    }

    fn sobjects_url(&self, rest: &str) -> String {
        format!("{}/services/data/{}/sobjects/{rest}", self.instance_url, self.api_version)
    }

    async fn create_task(
        &self,
        account_id: &str,
        context: &DispatchContext,
        summary: &StructuredSummary,
    ) -> Result<String, CrmError> {
        let title = context.call_title.as_deref().unwrap_or(context.call_id.as_str());
        let mut description = summary.to_plain_text();
        if let Some(url) = context.call_url.as_deref() {
            description.push_str(&format!("\n\nCall recording: {url}"));
        }

        let body = json!({
            "WhatId": account_id,
            "Subject": truncate(&format!("Call summary: {title}"), SUBJECT_LIMIT),
            "Description": truncate(&description, DESCRIPTION_LIMIT),
            "Status": "Completed",
            "TaskSubtype": "Call",
            "ActivityDate": Utc::now().date_naive().to_string(),
        });

        let response = self
            .client
            .post(self.sobjects_url("Task"))
            .bearer_auth(self.access_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| CrmError::Transport(error.to_string()))?;

        let created = read_json(response).await?;
        created
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CrmError::InvalidResponse("created task has no id".to_string()))
    }
}

#[async_trait]
impl CrmAccountReader for SalesforceClient {
    async fn fetch_account(&self, account_id: &str) -> Result<CrmAccountSnapshot, CrmError> {
        validate_record_id(account_id)?;

        let response = self
            .client
            .get(self.sobjects_url(&format!("Account/{account_id}")))
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(|error| CrmError::Transport(error.to_string()))?;

        let record = read_json(response).await?;
        let object = record
            .as_object()
            .ok_or_else(|| CrmError::InvalidResponse("account record is not an object".into()))?;

        Ok(CrmAccountSnapshot::fetched(account_id, flatten_record(object)))
    }
}

#[async_trait]
impl SummarySink for SalesforceClient {
    fn name(&self) -> &'static str {
        SINK_NAME
    }

    async fn deliver(
        &self,
        context: &DispatchContext,
        summary: &StructuredSummary,
    ) -> Result<SinkDelivery, SinkError> {
        let Some(account_id) = context.crm_account_id.as_deref() else {
            return Ok(SinkDelivery::Skipped {
                reason: "call is not linked to a CRM account".to_string(),
            });
        };

        let task_id = self.create_task(account_id, context, summary).await.map_err(|error| {
            match error {
                CrmError::Transport(message) => SinkError::Transport(message),
                CrmError::Rejected { status, message } => SinkError::Rejected { status, message },
                other => SinkError::InvalidResponse(other.to_string()),
            }
        })?;

        info!(
            event_name = "dispatch.crm.task_created",
            correlation_id = %context.invocation_id,
            call_id = %context.call_id,
            account_id,
            task_id = %task_id,
            "summary recorded on crm account"
        );
        Ok(SinkDelivery::Delivered { reference: Some(task_id) })
    }
}

// Salesforce ids are 15 or 18 alphanumeric characters.
fn validate_record_id(id: &str) -> Result<(), CrmError> {
    let valid = matches!(id.len(), 15 | 18) && id.chars().all(|c| c.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(CrmError::InvalidAccountId(id.to_string()))
    }
}

async fn read_json(response: Response) -> Result<Value, CrmError> {
    let status = response.status();
    let text = response.text().await.map_err(|error| CrmError::Transport(error.to_string()))?;

    if !status.is_success() {
        return Err(CrmError::Rejected { status: status.as_u16(), message: error_message(&text) });
    }
    serde_json::from_str(&text).map_err(|error| CrmError::InvalidResponse(error.to_string()))
}

/// Salesforce errors arrive as `[{"message": ..., "errorCode": ...}]`.
fn error_message(body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let first = parsed.as_ref().and_then(|value| value.get(0));
    match first {
        Some(error) => {
            let code = error.get("errorCode").and_then(Value::as_str).unwrap_or("UNKNOWN");
            let message = error.get("message").and_then(Value::as_str).unwrap_or("no message");
            format!("{code}: {message}")
        }
        None => body.trim().to_string(),
    }
}

/// Keeps scalar fields; nested objects and `attributes` metadata are dropped.
fn flatten_record(record: &serde_json::Map<String, Value>) -> BTreeMap<String, String> {
    record
        .iter()
        .filter(|(key, _)| key.as_str() != "attributes")
        .filter_map(|(key, value)| {
            let rendered = match value {
                Value::String(text) => text.clone(),
                Value::Number(number) => number.to_string(),
                Value::Bool(flag) => flag.to_string(),
                Value::Null => String::new(),
                Value::Array(_) | Value::Object(_) => return None,
            };
            Some((key.clone(), rendered))
        })
        .collect()
}

fn truncate(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use callbrief_core::config::CrmConfig;
    use callbrief_core::domain::summary::{DealHealth, OverallAssessment, Sentiment};
    use callbrief_core::{DispatchContext, SinkDelivery, SinkError, StructuredSummary, SummarySink};
    use reqwest::Client;
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{CrmAccountReader, CrmError, SalesforceClient};

    const ACCOUNT: &str = "0013t00001AbCdEAAV";

    fn client(server: &MockServer) -> SalesforceClient {
        SalesforceClient::new(
            Client::new(),
            server.uri(),
            SecretString::from("sf-token".to_string()),
            "v60.0",
        )
    }

    fn context(account: Option<&str>) -> DispatchContext {
        DispatchContext {
            invocation_id: "inv-1".to_string(),
            call_id: "c-1".to_string(),
            call_title: Some("Intro".to_string()),
            call_url: Some("https://calls.example.test/c-1".to_string()),
            crm_account_id: account.map(str::to_string),
        }
    }

    fn summary() -> StructuredSummary {
        StructuredSummary {
            summary: "Intro call.".to_string(),
            key_points: Vec::new(),
            objections: Vec::new(),
            action_items: Vec::new(),
            overall_assessment: OverallAssessment {
                sentiment: Sentiment::Neutral,
                deal_health: DealHealth::Moderate,
                next_steps: "Demo".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn fetch_account_flattens_scalar_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/services/data/v60.0/sobjects/Account/{ACCOUNT}")))
            .and(header("authorization", "Bearer sf-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "attributes": { "type": "Account" },
                "Id": ACCOUNT,
                "Name": "Globex",
                "AnnualRevenue": 1200000,
                "Industry": null,
                "BillingAddress": { "city": "Springfield" }
            })))
            .mount(&server)
            .await;

        let snapshot = client(&server).fetch_account(ACCOUNT).await.expect("account");
        let fields = snapshot.fields.expect("fields");
        assert_eq!(fields.get("Name").map(String::as_str), Some("Globex"));
        assert_eq!(fields.get("AnnualRevenue").map(String::as_str), Some("1200000"));
        assert_eq!(fields.get("Industry").map(String::as_str), Some(""));
        assert!(!fields.contains_key("attributes"));
        assert!(!fields.contains_key("BillingAddress"));
    }

    #[tokio::test]
    async fn malformed_account_ids_never_reach_the_api() {
        let server = MockServer::start().await;
        let error = client(&server).fetch_account("../Contact/x").await.expect_err("rejected");
        assert!(matches!(error, CrmError::InvalidAccountId(_)));
    }

    #[tokio::test]
    async fn deliver_creates_a_completed_task_on_the_account() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/services/data/v60.0/sobjects/Task"))
            .and(body_partial_json(json!({
                "WhatId": ACCOUNT,
                "Subject": "Call summary: Intro",
                "Status": "Completed"
            })))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({ "id": "00T1", "success": true, "errors": [] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let delivery =
            client(&server).deliver(&context(Some(ACCOUNT)), &summary()).await.expect("task");
        assert_eq!(delivery, SinkDelivery::Delivered { reference: Some("00T1".to_string()) });
    }

    #[tokio::test]
    async fn deliver_skips_calls_without_an_account() {
        let server = MockServer::start().await;
        let delivery = client(&server).deliver(&context(None), &summary()).await.expect("skip");
        assert!(matches!(delivery, SinkDelivery::Skipped { .. }));
    }

    #[tokio::test]
    async fn salesforce_errors_surface_code_and_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/services/data/v60.0/sobjects/Task"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!([
                {
                    "message": "Related To ID: id value of incorrect type",
                    "errorCode": "FIELD_INTEGRITY_EXCEPTION"
                }
            ])))
            .mount(&server)
            .await;

        let error =
            client(&server).deliver(&context(Some(ACCOUNT)), &summary()).await.expect_err("fails");
        match error {
            SinkError::Rejected { status, message } => {
                assert_eq!(status, 400);
                assert!(message.starts_with("FIELD_INTEGRITY_EXCEPTION"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn disabled_crm_builds_no_client() {
        let config = CrmConfig {
            enabled: false,
            instance_url: Some("https://acme.my.salesforce.com".to_string()),
            access_token: Some(SecretString::from("token".to_string())),
            api_version: "v60.0".to_string(),
        };
        assert!(SalesforceClient::from_config(Client::new(), &config).is_none());
    }
}
