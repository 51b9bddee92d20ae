use std::sync::Arc;
use std::time::Duration;

use callbrief_agent::{AgentRuntime, HttpSandboxClient, HttpToolLoopClient, RuntimeSettings};
use callbrief_core::config::AppConfig;
use callbrief_core::{ContextBuilder, PromptComposer, PromptError, SummarySink};
use callbrief_slack::SlackNotifier;
use thiserror::Error;
use tracing::{info, warn};

use crate::crm::{CrmAccountReader, SalesforceClient};
use crate::dispatch::Dispatcher;
use crate::pipeline::{CallPipeline, PipelineComponents};
use crate::signature::SignatureVerifier;
use crate::state::{AppState, InFlight, Readiness};
use crate::status::{StatusPage, StatusPageError};
use crate::transcript::{ProviderTranscriptClient, TranscriptSource};

/// Timeout for Slack, Salesforce and transcript requests. Agent runs use the
/// configured `agent.request_timeout_secs` instead.
const INTEGRATION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("http client could not be built: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    StatusPage(#[from] StatusPageError),
    #[error("`{0}` is required but was not set")]
    MissingSetting(&'static str),
}

/// Builds the application state from an already loaded configuration.
///
/// Validation failures do not abort startup: the returned state is marked
/// `Invalid` and carries no pipeline.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<AppState, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let status_page = StatusPage::new()?;

    if let Err(invalid) = config.validate() {
        warn!(
            event_name = "system.bootstrap.config_invalid",
            correlation_id = "bootstrap",
            error = %invalid,
            "configuration is invalid; serving status and health only"
        );
        return Ok(AppState::degraded(config, invalid.to_string(), status_page));
    }

    let integration_client = reqwest::Client::builder()
        .timeout(INTEGRATION_TIMEOUT)
        .build()
        .map_err(BootstrapError::HttpClient)?;
    let agent_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.agent.request_timeout_secs))
        .build()
        .map_err(BootstrapError::HttpClient)?;

    let runtime = build_runtime(&config, integration_client.clone(), agent_client)?;
    let company_name = config.agent.company_name.clone().unwrap_or_default();
    let composer = PromptComposer::new(company_name, config.agent.system_prompt.as_deref())?;

    let transcripts: Option<Arc<dyn TranscriptSource>> =
        ProviderTranscriptClient::from_config(integration_client.clone(), &config.provider)
            .map(|client| Arc::new(client) as Arc<dyn TranscriptSource>);

    let mut sinks: Vec<Arc<dyn SummarySink>> = Vec::new();
    if let Some(slack) = SlackNotifier::from_config(integration_client.clone(), &config.slack) {
        sinks.push(Arc::new(slack));
    }
    let mut crm_reader: Option<Arc<dyn CrmAccountReader>> = None;
    if let Some(salesforce) = SalesforceClient::from_config(integration_client, &config.crm) {
        let salesforce = Arc::new(salesforce);
        let reader: Arc<dyn CrmAccountReader> = salesforce.clone();
        crm_reader = Some(reader);
        sinks.push(salesforce);
    }
    let dispatcher = Dispatcher::new(sinks);

    let verifier = match &config.webhook.signing_secret {
        Some(secret) => {
            Some(Arc::new(SignatureVerifier::new(secret.clone(), config.webhook.tolerance_secs)))
        }
        None => {
            warn!(
                event_name = "system.bootstrap.signature_disabled",
                correlation_id = "bootstrap",
                "webhook.signing_secret is unset; inbound webhooks are not authenticated"
            );
            None
        }
    };

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        model = %config.agent.model,
        sinks = ?dispatcher.sink_names(),
        transcript_fetch = transcripts.is_some(),
        "application bootstrap complete"
    );

    let pipeline = CallPipeline::new(PipelineComponents {
        transcripts,
        context_builder: ContextBuilder::new(crm_reader.is_some()),
        crm_reader,
        composer,
        runtime,
        dispatcher,
    });

    Ok(AppState {
        config: Arc::new(config),
        readiness: Readiness::Ready,
        pipeline: Some(Arc::new(pipeline)),
        verifier,
        status_page: Arc::new(status_page),
        in_flight: InFlight::default(),
    })
}

fn build_runtime(
    config: &AppConfig,
    sandbox_client: reqwest::Client,
    agent_client: reqwest::Client,
) -> Result<AgentRuntime, BootstrapError> {
    let missing = BootstrapError::MissingSetting;
    let sandbox_url = config.sandbox.base_url.as_deref().ok_or(missing("sandbox.base_url"))?;
    let sandbox_key = config.sandbox.api_key.clone().ok_or(missing("sandbox.api_key"))?;
    let agent_url = config.agent.base_url.as_deref().ok_or(missing("agent.base_url"))?;
    let agent_key = config.agent.api_key.clone().ok_or(missing("agent.api_key"))?;

    Ok(AgentRuntime::new(
        Arc::new(HttpSandboxClient::new(sandbox_client, sandbox_url, sandbox_key)),
        Arc::new(HttpToolLoopClient::new(agent_client, agent_url, agent_key)),
        RuntimeSettings::from_config(&config.agent, &config.sandbox),
    ))
}

#[cfg(test)]
mod tests {
    use callbrief_core::config::AppConfig;

    use crate::bootstrap::bootstrap_with_config;
    use crate::state::Readiness;

    fn valid_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.agent.base_url = Some("https://agents.example.test".to_string());
        config.agent.api_key = Some(String::from("agent-key").into());
        config.agent.company_name = Some("Acme".to_string());
        config.sandbox.base_url = Some("https://sandbox.example.test".to_string());
        config.sandbox.api_key = Some(String::from("sandbox-key").into());
        config
    }

    #[tokio::test]
    async fn invalid_configuration_bootstraps_in_degraded_mode() {
        let state = bootstrap_with_config(AppConfig::default()).await.expect("degraded state");

        assert!(!state.readiness.is_ready());
        assert!(state.pipeline.is_none());
        assert!(state.readiness.detail().is_some_and(|detail| detail.contains("agent.base_url")));
    }

    #[tokio::test]
    async fn valid_configuration_builds_the_pipeline() {
        let state = bootstrap_with_config(valid_config()).await.expect("ready state");

        assert_eq!(state.readiness, Readiness::Ready);
        let pipeline = state.pipeline.expect("pipeline");
        assert!(pipeline.dispatcher().is_empty());
        assert!(state.verifier.is_none());
    }

    #[tokio::test]
    async fn enabled_integrations_become_sinks() {
        let mut config = valid_config();
        config.slack.enabled = true;
        config.slack.bot_token = String::from("xoxb-test").into();
        config.slack.channel_id = Some("C123".to_string());
        config.crm.enabled = true;
        config.crm.instance_url = Some("https://acme.my.salesforce.com".to_string());
        config.crm.access_token = Some(String::from("sf-token").into());
        config.webhook.signing_secret = Some(String::from("whsec").into());

        let state = bootstrap_with_config(config).await.expect("ready state");

        let pipeline = state.pipeline.expect("pipeline");
        assert_eq!(pipeline.dispatcher().sink_names(), vec!["slack", "crm"]);
        assert!(state.verifier.is_some());
    }

    #[tokio::test]
    async fn prompt_with_unknown_variable_bootstraps_degraded() {
        let mut config = valid_config();
        config.agent.system_prompt = Some("Summarize {{ call_titel }}".to_string());

        let state = bootstrap_with_config(config).await.expect("degraded state");

        assert!(state.pipeline.is_none());
        let detail = state.readiness.detail().expect("validation detail");
        assert!(detail.contains("agent.system_prompt"));
    }
}
