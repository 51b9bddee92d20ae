//! `POST /webhooks/calls`: authenticate, validate, acknowledge, then process
//! the call in a background task.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use callbrief_core::{InterfaceError, PipelineError, WebhookPayload};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::AppState;

#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedResponse {
    pub status: &'static str,
    pub invocation_id: String,
    pub call_id: String,
}

/// Maps an [`InterfaceError`] onto an HTTP response with a user-safe body.
#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        };

        let mut body = json!({
            "error": self.0.user_message(),
            "correlationId": self.0.correlation_id(),
        });
        // Validation details describe the caller's own payload.
        if let InterfaceError::BadRequest { message, .. } = &self.0 {
            body["detail"] = json!(message);
        }

        (status, Json(body)).into_response()
    }
}

pub async fn receive_call(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<AcceptedResponse>), ApiError> {
    let invocation_id = Uuid::new_v4().to_string();

    let Some(pipeline) = state.pipeline.clone() else {
        let reason = state.readiness.detail().unwrap_or("pipeline unavailable").to_string();
        warn!(
            event_name = "webhook.rejected_unready",
            correlation_id = %invocation_id,
            reason = %reason,
            "webhook refused because the configuration is invalid"
        );
        return Err(ApiError(PipelineError::Configuration(reason).into_interface(invocation_id)));
    };

    if let Some(verifier) = &state.verifier {
        if let Err(rejection) = verifier.verify(&headers, &body, Utc::now().timestamp()) {
            warn!(
                event_name = "webhook.signature_rejected",
                correlation_id = %invocation_id,
                reason = %rejection,
                "webhook signature verification failed"
            );
            return Err(ApiError(InterfaceError::Unauthorized {
                message: rejection.to_string(),
                correlation_id: invocation_id,
            }));
        }
    }

    let payload = match WebhookPayload::from_slice(&body) {
        Ok(payload) => payload,
        Err(invalid) => {
            warn!(
                event_name = "webhook.rejected_invalid",
                correlation_id = %invocation_id,
                error = %invalid,
                "webhook payload failed validation"
            );
            return Err(ApiError(invalid.into_interface(invocation_id)));
        }
    };

    let call_id = payload.call_id().to_string();
    info!(
        event_name = "webhook.accepted",
        correlation_id = %invocation_id,
        call_id = %call_id,
        is_test = payload.is_test,
        "webhook accepted for processing"
    );

    let task_invocation_id = invocation_id.clone();
    let guard = state.in_flight.enter();
    tokio::spawn(async move {
        // Outcome and failures are logged by the pipeline itself.
        let _ = pipeline.process(&task_invocation_id, &payload).await;
        drop(guard);
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse { status: "accepted", invocation_id, call_id }),
    ))
}
