use async_trait::async_trait;
use serde::Serialize;

use crate::domain::summary::StructuredSummary;
use crate::domain::webhook::WebhookPayload;
use crate::errors::SinkError;

/// Identifiers a sink needs to address the summary it delivers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DispatchContext {
    pub invocation_id: String,
    pub call_id: String,
    pub call_title: Option<String>,
    pub call_url: Option<String>,
    pub crm_account_id: Option<String>,
}

impl DispatchContext {
    pub fn from_payload(invocation_id: impl Into<String>, payload: &WebhookPayload) -> Self {
        let meta = payload.metadata();
        Self {
            invocation_id: invocation_id.into(),
            call_id: payload.call_id().to_string(),
            call_title: meta.title.clone(),
            call_url: meta.url.clone(),
            crm_account_id: payload.crm_account_id().map(str::to_string),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkDelivery {
    Delivered { reference: Option<String> },
    Skipped { reason: String },
}

/// A downstream destination for a finished summary.
#[async_trait]
pub trait SummarySink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(
        &self,
        context: &DispatchContext,
        summary: &StructuredSummary,
    ) -> Result<SinkDelivery, SinkError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkStatus {
    Delivered,
    Skipped,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SinkOutcome {
    pub sink: String,
    pub status: SinkStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SinkOutcome {
    pub fn from_result(sink: &str, result: Result<SinkDelivery, SinkError>) -> Self {
        match result {
            Ok(SinkDelivery::Delivered { reference }) => {
                Self { sink: sink.to_string(), status: SinkStatus::Delivered, detail: reference }
            }
            Ok(SinkDelivery::Skipped { reason }) => {
                Self { sink: sink.to_string(), status: SinkStatus::Skipped, detail: Some(reason) }
            }
            Err(error) => Self {
                sink: sink.to_string(),
                status: SinkStatus::Failed,
                detail: Some(error.to_string()),
            },
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub outcomes: Vec<SinkOutcome>,
}

impl DispatchReport {
    pub fn outcome(&self, sink: &str) -> Option<&SinkOutcome> {
        self.outcomes.iter().find(|outcome| outcome.sink == sink)
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.status == SinkStatus::Failed).count()
    }

    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.status == SinkStatus::Delivered).count()
    }
}

#[cfg(test)]
mod tests {
    use super::{DispatchContext, DispatchReport, SinkDelivery, SinkOutcome, SinkStatus};
    use crate::domain::webhook::WebhookPayload;
    use crate::errors::SinkError;

    #[test]
    fn context_carries_call_and_account_identifiers() {
        let payload = WebhookPayload::from_slice(
            br#"{"callData":{"metaData":{"id":"c-1","title":"Intro","url":"https://x.test/c-1"},
                "context":[{"system":"Salesforce","objects":[{"objectType":"Account","objectId":"001A"}]}]}}"#,
        )
        .expect("valid payload");

        let context = DispatchContext::from_payload("inv-1", &payload);
        assert_eq!(context.call_id, "c-1");
        assert_eq!(context.call_title.as_deref(), Some("Intro"));
        assert_eq!(context.crm_account_id.as_deref(), Some("001A"));
    }

    #[test]
    fn report_counts_outcomes_per_status() {
        let report = DispatchReport {
            outcomes: vec![
                SinkOutcome::from_result(
                    "slack",
                    Err(SinkError::Rejected { status: 500, message: "boom".to_string() }),
                ),
                SinkOutcome::from_result(
                    "crm",
                    Ok(SinkDelivery::Delivered { reference: Some("00T1".to_string()) }),
                ),
            ],
        };

        assert_eq!(report.failed(), 1);
        assert_eq!(report.delivered(), 1);
        let crm_status = report.outcome("crm").map(|outcome| outcome.status);
        assert_eq!(crm_status, Some(SinkStatus::Delivered));
        assert!(report
            .outcome("slack")
            .and_then(|outcome| outcome.detail.as_deref())
            .map(|detail| detail.contains("500"))
            .unwrap_or(false));
    }
}
