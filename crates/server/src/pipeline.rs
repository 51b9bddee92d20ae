//! Per-call orchestration from an accepted webhook to dispatched summary.

use std::sync::Arc;

use callbrief_agent::{AgentRuntime, SummaryRequest};
use callbrief_core::{
    ContextBuilder, CrmAccountSnapshot, DispatchContext, DispatchReport, PipelineError,
    PromptComposer, RemoteStage, StructuredSummary, Transcript, WebhookPayload,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::crm::CrmAccountReader;
use crate::dispatch::Dispatcher;
use crate::transcript::TranscriptSource;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutcome {
    pub invocation_id: String,
    pub call_id: String,
    pub files_written: usize,
    pub transcript_sentences: usize,
    pub open_objections: usize,
    pub summary: StructuredSummary,
    pub dispatch: DispatchReport,
}

pub struct PipelineComponents {
    pub transcripts: Option<Arc<dyn TranscriptSource>>,
    pub crm_reader: Option<Arc<dyn CrmAccountReader>>,
    pub context_builder: ContextBuilder,
    pub composer: PromptComposer,
    pub runtime: AgentRuntime,
    pub dispatcher: Dispatcher,
}

pub struct CallPipeline {
    transcripts: Option<Arc<dyn TranscriptSource>>,
    crm_reader: Option<Arc<dyn CrmAccountReader>>,
    context_builder: ContextBuilder,
    composer: PromptComposer,
    runtime: AgentRuntime,
    dispatcher: Dispatcher,
}

impl CallPipeline {
    pub fn new(components: PipelineComponents) -> Self {
        Self {
            transcripts: components.transcripts,
            crm_reader: components.crm_reader,
            context_builder: components.context_builder,
            composer: components.composer,
            runtime: components.runtime,
            dispatcher: components.dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub async fn process(
        &self,
        invocation_id: &str,
        payload: &WebhookPayload,
    ) -> Result<PipelineOutcome, PipelineError> {
        self.process_at(invocation_id, payload, Utc::now()).await
    }

    /// Same as [`CallPipeline::process`] with the prompt timestamp pinned.
    pub async fn process_at(
        &self,
        invocation_id: &str,
        payload: &WebhookPayload,
        now: DateTime<Utc>,
    ) -> Result<PipelineOutcome, PipelineError> {
        let result = self.run(invocation_id, payload, now).await;
        if let Err(failure) = &result {
            error!(
                event_name = "pipeline.failed",
                correlation_id = invocation_id,
                call_id = payload.call_id(),
                error_kind = failure.kind(),
                error = %failure,
                "call processing failed; no sink was invoked"
            );
        }
        result
    }

    async fn run(
        &self,
        invocation_id: &str,
        payload: &WebhookPayload,
        now: DateTime<Utc>,
    ) -> Result<PipelineOutcome, PipelineError> {
        let call_id = payload.call_id();
        info!(
            event_name = "pipeline.started",
            correlation_id = invocation_id,
            call_id,
            is_test = payload.is_test,
            "processing call"
        );

        let transcript = self.resolve_transcript(invocation_id, payload).await?;
        let crm_account = self.resolve_crm_account(invocation_id, payload).await;

        let context = self.context_builder.build(payload, &transcript, crm_account.as_ref());
        let workdir = self.runtime.settings().workdir.clone();
        let instructions = self
            .composer
            .compose(payload, &context.tree(), &workdir, now)
            .map_err(|error| PipelineError::Prompt(error.to_string()))?;

        let summary = self
            .runtime
            .summarize(SummaryRequest { invocation_id, payload, context: &context, instructions })
            .await?;

        let dispatch_context = DispatchContext::from_payload(invocation_id, payload);
        let dispatch = self.dispatcher.dispatch(&dispatch_context, &summary).await;

        info!(
            event_name = "pipeline.completed",
            correlation_id = invocation_id,
            call_id,
            files = context.len(),
            transcript_sentences = transcript.sentence_count(),
            open_objections = summary.open_objections(),
            sinks_delivered = dispatch.delivered(),
            sinks_failed = dispatch.failed(),
            "call processed"
        );

        Ok(PipelineOutcome {
            invocation_id: invocation_id.to_string(),
            call_id: call_id.to_string(),
            files_written: context.len(),
            transcript_sentences: transcript.sentence_count(),
            open_objections: summary.open_objections(),
            summary,
            dispatch,
        })
    }

    async fn resolve_transcript(
        &self,
        invocation_id: &str,
        payload: &WebhookPayload,
    ) -> Result<Transcript, PipelineError> {
        if let Some(inline) = payload.inline_transcript() {
            return Ok(inline);
        }

        let Some(source) = &self.transcripts else {
            warn!(
                event_name = "pipeline.transcript_unavailable",
                correlation_id = invocation_id,
                call_id = payload.call_id(),
                "no inline transcript and transcript fetch is not configured"
            );
            return Ok(Transcript::empty());
        };

        source
            .fetch(payload.call_id())
            .await
            .map_err(|error| PipelineError::remote(RemoteStage::TranscriptFetch, error.to_string()))
    }

    async fn resolve_crm_account(
        &self,
        invocation_id: &str,
        payload: &WebhookPayload,
    ) -> Option<CrmAccountSnapshot> {
        let reader = self.crm_reader.as_ref()?;
        let account_id = payload.crm_account_id()?;

        match reader.fetch_account(account_id).await {
            Ok(snapshot) => Some(snapshot),
            Err(error) => {
                warn!(
                    event_name = "pipeline.crm_account_unavailable",
                    correlation_id = invocation_id,
                    call_id = payload.call_id(),
                    account_id,
                    error = %error,
                    "crm account could not be read; continuing without it"
                );
                Some(CrmAccountSnapshot::unavailable(account_id))
            }
        }
    }
}
