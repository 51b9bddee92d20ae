use async_trait::async_trait;
use callbrief_core::config::SlackConfig;
use callbrief_core::{DispatchContext, SinkDelivery, SinkError, StructuredSummary, SummarySink};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::info;

use crate::blocks::summary_message;

pub const SINK_NAME: &str = "slack";

/// Posts summaries to one channel through `chat.postMessage`.
pub struct SlackNotifier {
    client: Client,
    api_base_url: String,
    bot_token: SecretString,
    channel_id: String,
}

impl SlackNotifier {
    pub fn new(
        client: Client,
        api_base_url: impl Into<String>,
        bot_token: SecretString,
        channel_id: impl Into<String>,
    ) -> Self {
        let api_base_url = api_base_url.into().trim_end_matches('/').to_string();
        Self { client, api_base_url, bot_token, channel_id: channel_id.into() }
    }

    /// `None` when Slack is disabled or has no channel to post to.
    pub fn from_config(client: Client, config: &SlackConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let channel_id = config.channel_id.as_deref()?.trim();
        if channel_id.is_empty() {
            return None;
        }
        Some(Self::new(client, &config.api_base_url, config.bot_token.clone(), channel_id))
    }
}

#[async_trait]
impl SummarySink for SlackNotifier {
    fn name(&self) -> &'static str {
        SINK_NAME
    }

    async fn deliver(
        &self,
        context: &DispatchContext,
        summary: &StructuredSummary,
    ) -> Result<SinkDelivery, SinkError> {
        let message = summary_message(context, summary);
        let body = json!({
            "channel": self.channel_id,
            "text": message.fallback_text,
            "blocks": message.blocks,
            "unfurl_links": false,
        });

        let response = self
            .client
            .post(format!("{}/chat.postMessage", self.api_base_url))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| SinkError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected { status: status.as_u16(), message });
        }

        let result: Value =
            response.json().await.map_err(|error| SinkError::InvalidResponse(error.to_string()))?;

        // Slack answers 200 for application errors and signals them with `ok`.
        if result.get("ok").and_then(Value::as_bool) != Some(true) {
            let error = result.get("error").and_then(Value::as_str).unwrap_or("unknown_error");
            return Err(SinkError::Rejected { status: status.as_u16(), message: error.to_string() });
        }

        let ts = result.get("ts").and_then(Value::as_str).map(str::to_string);
        info!(
            event_name = "dispatch.slack.posted",
            correlation_id = %context.invocation_id,
            call_id = %context.call_id,
            channel = %self.channel_id,
            "summary posted to slack"
        );
        Ok(SinkDelivery::Delivered { reference: ts })
    }
}

#[cfg(test)]
mod tests {
    use callbrief_core::config::SlackConfig;
    use callbrief_core::domain::summary::{DealHealth, OverallAssessment, Sentiment};
    use callbrief_core::{DispatchContext, SinkDelivery, SinkError, StructuredSummary, SummarySink};
    use reqwest::Client;
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::SlackNotifier;

    fn context() -> DispatchContext {
        DispatchContext {
            invocation_id: "inv-1".to_string(),
            call_id: "c-1".to_string(),
            call_title: Some("Intro".to_string()),
            call_url: None,
            crm_account_id: None,
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
                deal_health: DealHealth::Unknown,
                next_steps: "None agreed".to_string(),
            },
        }
    }

    fn notifier(server: &MockServer) -> SlackNotifier {
        SlackNotifier::new(
            Client::new(),
            server.uri(),
            SecretString::from("xoxb-test".to_string()),
            "C123",
        )
    }

    #[tokio::test]
    async fn posts_blocks_to_the_configured_channel() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(header("authorization", "Bearer xoxb-test"))
            .and(body_partial_json(json!({ "channel": "C123", "text": "Call summary: Intro" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "ts": "1700.01" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let delivery = notifier(&server).deliver(&context(), &summary()).await.expect("posted");
        assert_eq!(delivery, SinkDelivery::Delivered { reference: Some("1700.01".to_string()) });
    }

    #[tokio::test]
    async fn ok_false_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "ok": false, "error": "channel_not_found" })),
            )
            .mount(&server)
            .await;

        let error = notifier(&server).deliver(&context(), &summary()).await.expect_err("rejected");
        assert_eq!(
            error,
            SinkError::Rejected { status: 200, message: "channel_not_found".to_string() }
        );
    }

    #[test]
    fn disabled_or_channelless_config_builds_no_sink() {
        let mut config = SlackConfig {
            enabled: false,
            bot_token: SecretString::from("xoxb-test".to_string()),
            channel_id: Some("C123".to_string()),
            api_base_url: "https://slack.com/api".to_string(),
        };
        assert!(SlackNotifier::from_config(Client::new(), &config).is_none());

        config.enabled = true;
        assert!(SlackNotifier::from_config(Client::new(), &config).is_some());

        config.channel_id = Some("  ".to_string());
        assert!(SlackNotifier::from_config(Client::new(), &config).is_none());
    }
}
