use std::sync::Arc;
use std::time::Duration;

use callbrief_core::config::{AgentConfig, SandboxConfig};
use callbrief_core::{CallContext, PipelineError, RemoteStage, StructuredSummary, WebhookPayload};
use tracing::{info, warn};

use crate::client::{InvocationError, ToolLoopClient};
use crate::invocation::{AgentInvocation, InvocationInput, SandboxBinding};
use crate::provider::ProviderOptions;
use crate::sandbox::{SandboxClient, SandboxFile, SandboxSession};
use crate::schema::output_schema;
use crate::tools::ToolSet;

#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeSettings {
    pub model: String,
    pub provider_options: ProviderOptions,
    pub max_steps: u32,
    pub sandbox_timeout: Duration,
    pub workdir: String,
}

impl RuntimeSettings {
    pub fn from_config(agent: &AgentConfig, sandbox: &SandboxConfig) -> Self {
        Self {
            model: agent.model.clone(),
            provider_options: ProviderOptions::from_config(agent),
            max_steps: agent.max_steps,
            sandbox_timeout: Duration::from_secs(sandbox.timeout_secs),
            workdir: sandbox.workdir.trim_end_matches('/').to_string(),
        }
    }

    fn sandbox_path(&self, relative: &str) -> String {
        format!("{}/{}", self.workdir, relative.trim_start_matches('/'))
    }
}

/// Everything one summary run needs; built by the pipeline.
pub struct SummaryRequest<'a> {
    pub invocation_id: &'a str,
    pub payload: &'a WebhookPayload,
    pub context: &'a CallContext,
    pub instructions: String,
}

/// Drives one remote summary: sandbox session, files, then the tool loop.
///
/// Nothing is retried. Every remote failure is reported with the stage that
/// produced it.
pub struct AgentRuntime {
    sandbox: Arc<dyn SandboxClient>,
    tool_loop: Arc<dyn ToolLoopClient>,
    tools: ToolSet,
    settings: RuntimeSettings,
}

impl AgentRuntime {
    pub fn new(
        sandbox: Arc<dyn SandboxClient>,
        tool_loop: Arc<dyn ToolLoopClient>,
        settings: RuntimeSettings,
    ) -> Self {
        Self { sandbox, tool_loop, tools: ToolSet::sandbox_defaults(), settings }
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    pub async fn summarize(
        &self,
        request: SummaryRequest<'_>,
    ) -> Result<StructuredSummary, PipelineError> {
        let session = self.prepare_sandbox(&request).await?;
        let invocation = self.build_invocation(&request, &session);

        info!(
            event_name = "agent.run.started",
            correlation_id = request.invocation_id,
            call_id = request.payload.call_id(),
            sandbox_session = %session.id,
            model = %self.settings.model,
            "starting tool-loop run"
        );

        let output = self.tool_loop.run(&invocation).await.map_err(|error| {
            warn!(
                event_name = "agent.run.failed",
                correlation_id = request.invocation_id,
                call_id = request.payload.call_id(),
                error = %error,
                "tool-loop run failed"
            );
            invocation_failure(error)
        })?;

        let summary = StructuredSummary::from_value(output)
            .map_err(|error| PipelineError::SchemaValidation(error.to_string()))?;

        info!(
            event_name = "agent.run.completed",
            correlation_id = request.invocation_id,
            call_id = request.payload.call_id(),
            key_points = summary.key_points.len(),
            action_items = summary.action_items.len(),
            "structured summary received"
        );
        Ok(summary)
    }

    async fn prepare_sandbox(
        &self,
        request: &SummaryRequest<'_>,
    ) -> Result<SandboxSession, PipelineError> {
        let session = self
            .sandbox
            .create_session(self.settings.sandbox_timeout)
            .await
            .map_err(|error| PipelineError::remote(RemoteStage::SandboxCreate, error.to_string()))?;

        info!(
            event_name = "agent.sandbox.created",
            correlation_id = request.invocation_id,
            call_id = request.payload.call_id(),
            sandbox_session = %session.id,
            timeout_secs = self.settings.sandbox_timeout.as_secs(),
            "sandbox session created"
        );

        for directory in request.context.directories() {
            let path = self.settings.sandbox_path(&directory);
            self.sandbox
                .make_dir(&session, &path)
                .await
                .map_err(|error| {
                    PipelineError::remote(RemoteStage::SandboxMkdir, error.to_string())
                })?;
        }

        let files: Vec<SandboxFile> = request
            .context
            .files()
            .iter()
            .map(|file| SandboxFile {
                path: self.settings.sandbox_path(&file.path),
                content: file.content.clone(),
            })
            .collect();
        self.sandbox.write_files(&session, &files).await.map_err(|error| {
            PipelineError::remote(RemoteStage::SandboxWriteFiles, error.to_string())
        })?;

        info!(
            event_name = "agent.sandbox.files_written",
            correlation_id = request.invocation_id,
            call_id = request.payload.call_id(),
            files = files.len(),
            "call context written to sandbox"
        );
        Ok(session)
    }

    fn build_invocation(
        &self,
        request: &SummaryRequest<'_>,
        session: &SandboxSession,
    ) -> AgentInvocation {
        AgentInvocation {
            model: self.settings.model.clone(),
            provider_options: self.settings.provider_options.as_value().clone(),
            instructions: request.instructions.clone(),
            tools: self.tools.definitions(),
            output_schema: output_schema(),
            input: InvocationInput {
                webhook: request.payload.clone(),
                crm_account_id: request.payload.crm_account_id().map(str::to_string),
            },
            sandbox: SandboxBinding {
                session_id: session.id.clone(),
                workdir: self.settings.workdir.clone(),
            },
            max_steps: self.settings.max_steps,
        }
    }
}

fn invocation_failure(error: InvocationError) -> PipelineError {
    match error {
        InvocationError::SchemaValidation(message) => PipelineError::SchemaValidation(message),
        InvocationError::MalformedResponse(message) => PipelineError::MalformedResponse(message),
        other @ (InvocationError::Transport(_) | InvocationError::Platform { .. }) => {
            PipelineError::remote(RemoteStage::AgentRun, other.to_string())
        }
    }
}
