//! Callbrief core: configuration, error taxonomy, domain types and the pure
//! transformations that turn a call webhook into sandbox files and a prompt.
//!
//! Nothing in this crate performs I/O beyond reading the config file.

pub mod config;
pub mod context;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod prompt;
pub mod render;

pub use context::ContextBuilder;
pub use dispatch::{
    DispatchContext, DispatchReport, SinkDelivery, SinkOutcome, SinkStatus, SummarySink,
};
pub use domain::crm::CrmAccountSnapshot;
pub use domain::files::{CallContext, FileTree, VirtualFile};
pub use domain::summary::StructuredSummary;
pub use domain::webhook::{Transcript, WebhookPayload};
pub use errors::{InterfaceError, PipelineError, RemoteStage, SinkError, WebhookValidationError};
pub use prompt::{PromptComposer, PromptError};
