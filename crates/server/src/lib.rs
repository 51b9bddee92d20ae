//! HTTP surface and per-call orchestration for callbrief.
//!
//! `bootstrap` turns an [`callbrief_core::config::AppConfig`] into an
//! [`AppState`]; [`router`] exposes it over axum. A configuration that fails
//! validation still yields a state, in which case the webhook route answers 503
//! and only the status page and health endpoint are useful.

pub mod bootstrap;
pub mod crm;
pub mod dispatch;
pub mod health;
pub mod pipeline;
pub mod signature;
pub mod state;
pub mod status;
pub mod transcript;
pub mod webhook;

use axum::{
    routing::{get, post},
    Router,
};

pub use bootstrap::{bootstrap_with_config, BootstrapError};
pub use pipeline::{CallPipeline, PipelineComponents, PipelineOutcome};
pub use state::{AppState, Readiness};

pub const WEBHOOK_PATH: &str = "/webhooks/calls";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status::status_page))
        .route("/health", get(health::health))
        .route(WEBHOOK_PATH, post(webhook::receive_call))
        .with_state(state)
}
