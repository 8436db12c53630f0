//! HTTP surface: the public reading endpoint, the platform webhook and a
//! health check.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::channels::WebhookPayload;
use crate::error::{Error, ValidationError};
use crate::pipeline::{
    EventProcessor, EventSource, IpRateLimiter, ReadingResponse, ReadingSource,
};
use crate::tarot::ContentFilter;

pub const SERVICE_NAME: &str = "tarot-bot";

/// Header carrying the admin bypass token.
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub readings: Arc<dyn ReadingSource>,
    pub processor: Arc<EventProcessor>,
    pub limiter: Arc<IpRateLimiter>,
    pub filter: Arc<ContentFilter>,
}

/// Build the Axum router.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/reading", post(create_reading))
        .route("/webhook", post(webhook))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::RateLimit(_) => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match self {
            Error::Validation(e) => e.to_string(),
            Error::RateLimit(e) => e.to_string(),
            Error::Generation(e) => {
                error!(error = %e, "Reading generation failed");
                "Failed to generate reading".to_string()
            }
            other => {
                error!(error = %other, "Request failed");
                "Internal server error".to_string()
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Client key for the per-IP limiter: first `x-forwarded-for` entry.
pub fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": SERVICE_NAME
    }))
}

// ── Reading ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ReadingRequest {
    question: Option<String>,
}

async fn create_reading(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> crate::error::Result<Json<ReadingResponse>> {
    let client = client_key(&headers);
    let admin_token = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());
    state.limiter.check(&client, admin_token).into_result()?;

    let request: ReadingRequest = serde_json::from_slice(&body)
        .map_err(|e| ValidationError::InvalidPayload(e.to_string()))?;
    let question = request
        .question
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or(ValidationError::MissingQuestion)?;

    state.filter.validate(question)?;

    debug!(client = %client, "Generating reading over HTTP");
    let reading = state.readings.generate_reading(question).await?;
    Ok(Json(ReadingResponse::from(&reading)))
}

// ── Webhook ─────────────────────────────────────────────────────────────

async fn webhook(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            error!(error = %e, "Unreadable webhook body");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"message": "Error processing event"})),
            );
        }
    };

    let mut processed = false;
    for event in payload.into_events() {
        match event {
            Ok(event) => {
                let platform = event.platform;
                let outcome = state.processor.process(event, EventSource::Webhook).await;
                debug!(
                    platform = platform.label(),
                    outcome = outcome.label(),
                    "Webhook event handled"
                );
                processed = true;
            }
            Err(e) => warn!(error = %e, "Invalid webhook event"),
        }
    }

    let message = if processed {
        "Event processed successfully"
    } else {
        "Event ignored"
    };

    (StatusCode::OK, Json(serde_json::json!({ "message": message })))
}
