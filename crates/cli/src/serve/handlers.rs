//! Route handlers. Every run handler takes the run lock first.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use costguard_core::RunResponse;
use costguard_engine::TriggerPayload;

use super::json_error;
use super::state::AppState;

/// Turn a run envelope into an HTTP response carrying its status code.
fn respond(response: RunResponse) -> Response {
    let status =
        StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response.body)).into_response()
}

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(response))
}

/// POST /trigger
///
/// An empty body, or one without `source`, is a manual trigger.
pub(crate) async fn handle_trigger(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let payload = if body.iter().all(u8::is_ascii_whitespace) {
        TriggerPayload::default()
    } else {
        match serde_json::from_slice::<TriggerPayload>(&body) {
            Ok(p) => p,
            Err(e) => {
                return json_error(
                    StatusCode::BAD_REQUEST,
                    &format!("invalid trigger payload: {}", e),
                )
                .into_response()
            }
        }
    };
    let source = payload.trigger_source();

    let _run = state.run_lock.lock().await;
    tracing::info!(source = ?source, reason = source.reason(), "shutdown trigger received");
    let report = state.guardrail.handle_trigger(source, state.now()).await;
    respond(RunResponse::ok(&report))
}

/// POST /check-spend
pub(crate) async fn handle_check_spend(State(state): State<Arc<AppState>>) -> Response {
    let _run = state.run_lock.lock().await;
    let result = state.guardrail.check_spend(state.now()).await;
    respond(RunResponse::ok(&result))
}

/// POST /enforce-tags
pub(crate) async fn handle_enforce_tags(State(state): State<Arc<AppState>>) -> Response {
    let _run = state.run_lock.lock().await;
    match state.guardrail.enforce_tags(state.now()).await {
        Ok(summary) => respond(RunResponse::ok(&summary)),
        Err(e) => json_error(StatusCode::SERVICE_UNAVAILABLE, &e.to_string()).into_response(),
    }
}

/// POST /enforce-limit
pub(crate) async fn handle_enforce_limit(State(state): State<Arc<AppState>>) -> Response {
    let _run = state.run_lock.lock().await;
    match state.guardrail.enforce_limit(state.now()).await {
        Ok(result) => respond(RunResponse::ok(&result)),
        Err(e) => json_error(StatusCode::SERVICE_UNAVAILABLE, &e.to_string()).into_response(),
    }
}
