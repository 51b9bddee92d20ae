use axum::{extract::State, http::StatusCode, response::Html};
use callbrief_core::config::AppConfig;
use callbrief_core::render::or_unknown;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tera::{Context, Tera};
use thiserror::Error;
use tracing::error;

use crate::state::{AppState, Readiness};

const TEMPLATE_NAME: &str = "status.html";

#[derive(Debug, Error)]
#[error("status page template is invalid: {0}")]
pub struct StatusPageError(#[from] tera::Error);

#[derive(Debug, Serialize)]
struct IntegrationRow {
    name: &'static str,
    enabled: bool,
}

pub struct StatusPage {
    templates: Tera,
}

impl StatusPage {
    pub fn new() -> Result<Self, StatusPageError> {
        let mut templates = Tera::default();
        templates.add_raw_template(TEMPLATE_NAME, include_str!("../../../templates/status.html"))?;
        Ok(Self { templates })
    }

    pub fn render(
        &self,
        config: &AppConfig,
        readiness: &Readiness,
        now: DateTime<Utc>,
    ) -> Result<String, StatusPageError> {
        let integrations = config.integrations();
        let rows = [
            IntegrationRow { name: "Slack", enabled: integrations.slack },
            IntegrationRow { name: "Salesforce", enabled: integrations.crm },
            IntegrationRow { name: "Transcript fetch", enabled: integrations.transcript_fetch },
            IntegrationRow {
                name: "Webhook signature verification",
                enabled: integrations.signature_verification,
            },
        ];

        let mut context = Context::new();
        context.insert("ready", &readiness.is_ready());
        context.insert("error", readiness.detail().unwrap_or_default());
        context.insert("model", &config.agent.model);
        context.insert("company_name", &or_unknown(config.agent.company_name.as_deref()));
        context.insert("integrations", &rows);
        context.insert("rendered_at", &now.to_rfc3339_opts(SecondsFormat::Secs, true));

        Ok(self.templates.render(TEMPLATE_NAME, &context)?)
    }
}

pub async fn status_page(
    State(state): State<AppState>,
) -> Result<Html<String>, (StatusCode, Html<String>)> {
    state.status_page.render(&state.config, &state.readiness, Utc::now()).map(Html).map_err(
        |render_error| {
            error!(
                event_name = "system.status_page.render_failed",
                correlation_id = "status",
                error = %render_error,
                "status page could not be rendered"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html("<h1>Status page unavailable</h1>".to_string()),
            )
        },
    )
}
