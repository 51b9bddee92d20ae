//! Remote invocation adapter.
//!
//! Materializes a call context inside a remote sandbox session and asks a
//! hosted tool-loop runtime for a `StructuredSummary`:
//!
//! 1. **Sandbox** (`sandbox`) - create a session, make directories, write files
//! 2. **Invocation** (`invocation`, `provider`, `tools`, `schema`) - model,
//!    reasoning options, tool declarations and the output schema
//! 3. **Run** (`client`) - one request to the runtime, interpreted strictly
//!
//! `AgentRuntime` (see `runtime`) ties the steps together. The runtime never
//! retries; the caller decides what a failed call means.

pub mod client;
pub mod invocation;
pub mod provider;
pub mod runtime;
pub mod sandbox;
pub mod schema;
pub mod tools;

pub use client::{HttpToolLoopClient, InvocationError, ToolLoopClient};
pub use runtime::{AgentRuntime, RuntimeSettings, SummaryRequest};
pub use sandbox::{HttpSandboxClient, SandboxClient, SandboxError};
