//! Monitoring control endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::chains::evm::types::is_valid_tx_hash;
use crate::workers::transaction_monitor::{MonitorError, TransactionMonitor};

pub struct MonitorState {
    pub monitor: Arc<TransactionMonitor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartMonitoringRequest {
    pub payment_intent_id: Uuid,
    pub transaction_hash: String,
    pub chain_id: u64,
}

/// POST /api/monitor
pub async fn start_monitoring(
    State(state): State<Arc<MonitorState>>,
    Json(request): Json<StartMonitoringRequest>,
) -> impl IntoResponse {
    if !is_valid_tx_hash(&request.transaction_hash) {
        warn!(
            payment_intent_id = %request.payment_intent_id,
            tx_hash = %request.transaction_hash,
            "rejected monitoring request with malformed transaction hash"
        );
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "error": "Invalid transaction hash"})),
        );
    }

    match state.monitor.start_monitoring(
        request.payment_intent_id,
        request.transaction_hash,
        request.chain_id,
    ) {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"success": true, "message": "Monitoring started"})),
        ),
        Err(MonitorError::UnsupportedChain { chain_id }) => {
            warn!(
                payment_intent_id = %request.payment_intent_id,
                chain_id = chain_id,
                "rejected monitoring request for unsupported chain"
            );
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"success": false, "error": "Unsupported chain"})),
            )
        }
    }
}

/// DELETE /api/monitor/{payment_intent_id}
///
/// Always answers 200; stopping a missing task is a no-op.
pub async fn stop_monitoring(
    State(state): State<Arc<MonitorState>>,
    Path(payment_intent_id): Path<Uuid>,
) -> impl IntoResponse {
    let stopped = state.monitor.stop_monitoring(payment_intent_id);
    info!(
        payment_intent_id = %payment_intent_id,
        stopped = stopped,
        "stop monitoring requested"
    );

    (
        StatusCode::OK,
        Json(json!({"success": true, "stopped": stopped})),
    )
}
