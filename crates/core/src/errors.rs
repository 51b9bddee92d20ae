use thiserror::Error;

/// Rejection of an inbound webhook before any remote session is created.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WebhookValidationError {
    #[error("webhook payload is not valid JSON for this endpoint: {0}")]
    Malformed(String),
    #[error("webhook payload is missing callData.metaData.id")]
    MissingCallId,
    #[error("webhook payload field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// The remote call that failed, reported with every remote-platform error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoteStage {
    TranscriptFetch,
    SandboxCreate,
    SandboxMkdir,
    SandboxWriteFiles,
    AgentRun,
}

impl RemoteStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TranscriptFetch => "provider.transcript",
            Self::SandboxCreate => "sandbox.create",
            Self::SandboxMkdir => "sandbox.mkdir",
            Self::SandboxWriteFiles => "sandbox.write_files",
            Self::AgentRun => "agent.run",
        }
    }
}

impl std::fmt::Display for RemoteStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error(transparent)]
    WebhookValidation(#[from] WebhookValidationError),
    #[error("remote platform failure during {stage}: {message}")]
    RemotePlatform { stage: RemoteStage, message: String },
    #[error("agent output failed schema validation: {0}")]
    SchemaValidation(String),
    #[error("agent runtime returned a malformed response: {0}")]
    MalformedResponse(String),
    #[error("prompt composition failed: {0}")]
    Prompt(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl PipelineError {
    pub fn remote(stage: RemoteStage, message: impl Into<String>) -> Self {
        Self::RemotePlatform { stage, message: message.into() }
    }

    /// Stable snake_case label used in logs and outcome payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::WebhookValidation(_) => "webhook_validation",
            Self::RemotePlatform { .. } => "remote_platform",
            Self::SchemaValidation(_) => "schema_validation",
            Self::MalformedResponse(_) => "malformed_response",
            Self::Prompt(_) => "prompt",
            Self::Configuration(_) => "configuration",
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let message = self.to_string();
        match self {
            Self::WebhookValidation(_) => InterfaceError::BadRequest { message, correlation_id },
            Self::RemotePlatform { .. }
            | Self::SchemaValidation(_)
            | Self::MalformedResponse(_)
            | Self::Prompt(_)
            | Self::Configuration(_) => {
                InterfaceError::ServiceUnavailable { message, correlation_id }
            }
        }
    }
}

/// Failure of one downstream sink. Logged and reported, never propagated.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SinkError {
    #[error("sink request failed: {0}")]
    Transport(String),
    #[error("sink rejected the request with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("sink returned an unexpected response: {0}")]
    InvalidResponse(String),
    #[error("sink task aborted: {0}")]
    Aborted(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("unauthorized: {message}")]
    Unauthorized { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Unauthorized { .. } => "The request signature could not be verified.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Unauthorized { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. } => correlation_id,
        }
    }
}

impl WebhookValidationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        PipelineError::from(self).into_interface(correlation_id)
    }
}
