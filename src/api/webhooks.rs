//! Reference webhook receiver
//!
//! Demonstrates the receiver-side contract merchants implement: read the
//! raw body first, verify the signature header against it, and only then
//! parse the JSON payload.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tracing::{info, warn};

use crate::services::webhook_dispatcher::SIGNATURE_HEADER;
use crate::services::webhook_verify::verify_signature;

pub struct WebhookReceiverState {
    pub secret: String,
}

/// POST /api/webhooks/example
pub async fn example_receiver(
    State(state): State<Arc<WebhookReceiverState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    // Verification runs over the raw body bytes, never a re-serialization
    if !verify_signature(&body, signature, &state.secret) {
        warn!("webhook signature verification failed");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Invalid signature"})),
        )
            .into_response();
    }

    let payload: JsonValue = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "verified webhook carried invalid JSON");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Invalid JSON"})),
            )
                .into_response();
        }
    };

    info!(
        event = payload.get("event").and_then(|v| v.as_str()).unwrap_or("unknown"),
        event_id = payload.get("id").and_then(|v| v.as_str()).unwrap_or("unknown"),
        "webhook received and verified"
    );

    (StatusCode::OK, Json(json!({"status": "ok"}))).into_response()
}
