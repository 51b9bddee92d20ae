use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;

use crate::state::{AppState, Readiness};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub configuration: HealthCheck,
    pub checked_at: String,
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let configuration = configuration_check(&state.readiness);
    let ready = state.readiness.is_ready();

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        configuration,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn configuration_check(readiness: &Readiness) -> HealthCheck {
    match readiness {
        Readiness::Ready => {
            HealthCheck { status: "ready", detail: "configuration validated".to_string() }
        }
        Readiness::Invalid(reason) => {
            HealthCheck { status: "invalid", detail: format!("configuration invalid: {reason}") }
        }
    }
}
