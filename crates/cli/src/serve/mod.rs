//! `costguard serve` -- HTTP trigger server.
//!
//! Lets budget events, alarms and schedulers drive the guardrail over HTTP.
//! Runs are serialised behind one lock, so overlapping requests queue
//! rather than interleave.
//!
//! Security:
//! - CORS headers on all responses (permissive)
//! - Per-IP rate limiting (default: 30 req/min, `COSTGUARD_RATE_LIMIT`)
//! - Optional API key authentication via `COSTGUARD_API_KEY`
//!
//! Endpoints:
//! - GET  /health         - Server status (exempt from auth and rate limit)
//! - POST /trigger        - Full shutdown; body `{"source": "..."}`, optional
//! - POST /check-spend    - Spend check, shutting down on a breach
//! - POST /enforce-tags   - Tag policy sweep
//! - POST /enforce-limit  - Instance cap
//!
//! Run endpoints answer with the run body and the run's status code.

mod handlers;
mod middleware;
mod state;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Json, Router};
use costguard_engine::Guardrail;
use time::OffsetDateTime;
use tower_http::cors::{Any, CorsLayer};

use self::handlers::{
    handle_check_spend, handle_enforce_limit, handle_enforce_tags, handle_health,
    handle_not_found, handle_trigger,
};
use self::middleware::{auth_middleware, rate_limit_middleware};
use self::state::AppState;

/// Maximum request body size: 64 KB. Trigger payloads are tiny.
const MAX_BODY_SIZE: usize = 64 * 1024;

/// Default rate limit: 30 requests per minute per IP.
const DEFAULT_RATE_LIMIT: u64 = 30;

/// Rate limit window duration in seconds.
const RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (status, Json(serde_json::json!({"error": message})))
}

/// All routes and layers over `state`.
pub(crate) fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/trigger", post(handle_trigger))
        .route("/check-spend", post(handle_check_spend))
        .route("/enforce-tags", post(handle_enforce_tags))
        .route("/enforce-limit", post(handle_enforce_limit))
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Serve the guardrail on `port` until Ctrl+C.
pub(crate) async fn start_server(
    guardrail: Guardrail,
    port: u16,
    fixed_now: Option<OffsetDateTime>,
) -> Result<(), Box<dyn std::error::Error>> {
    let rate_limit = std::env::var("COSTGUARD_RATE_LIMIT")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_RATE_LIMIT);

    let api_key = std::env::var("COSTGUARD_API_KEY")
        .ok()
        .filter(|k| !k.is_empty());

    if api_key.is_some() {
        eprintln!("API key authentication enabled");
    }
    eprintln!("Rate limit: {} requests per minute per IP", rate_limit);

    let state = Arc::new(
        AppState::new(guardrail, rate_limit)
            .with_api_key(api_key)
            .with_fixed_now(fixed_now),
    );
    let app = router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    eprintln!("costguard listening on http://0.0.0.0:{}", port);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    eprintln!("\nServer shut down.");
    Ok(())
}

/// Wait for Ctrl+C. If the handler cannot be installed the server runs
/// until killed.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    eprintln!("\nReceived shutdown signal...");
}
