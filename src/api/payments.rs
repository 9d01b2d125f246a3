//! Payment intent collaborator endpoints
//!
//! Thin CRUD over the store: initialize an intent from a button, read its
//! status, attach an observed transaction hash and hand the intent to the
//! monitor. Everything terminal-state related happens in the monitor; these
//! handlers only create and read.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::chains::evm::types::is_valid_tx_hash;
use crate::database::button_repository::ButtonRepository;
use crate::database::payment_intent_repository::{PaymentIntent, PaymentIntentRepository};
use crate::logging::mask_address;
use crate::workers::transaction_monitor::{MonitorError, TransactionMonitor};

pub struct PaymentsState {
    pub intents: Arc<PaymentIntentRepository>,
    pub buttons: ButtonRepository,
    pub monitor: Arc<TransactionMonitor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitPaymentRequest {
    pub button_id: Uuid,
    pub customer_address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachHashRequest {
    pub transaction_hash: String,
}

/// Public view of a payment intent
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentView {
    pub id: Uuid,
    pub button_id: Uuid,
    pub amount: String,
    pub token_address: Option<String>,
    pub chain_id: i64,
    pub merchant_address: String,
    pub transaction_hash: Option<String>,
    pub status: String,
    pub created_at: String,
    pub confirmed_at: Option<String>,
}

impl From<PaymentIntent> for PaymentIntentView {
    fn from(intent: PaymentIntent) -> Self {
        Self {
            id: intent.id,
            button_id: intent.button_id,
            amount: intent.amount,
            token_address: intent.token_address,
            chain_id: intent.chain_id,
            merchant_address: intent.merchant_address,
            transaction_hash: intent.transaction_hash,
            status: intent.status,
            created_at: intent.created_at.to_rfc3339(),
            confirmed_at: intent.confirmed_at.map(|at| at.to_rfc3339()),
        }
    }
}

/// POST /api/payments/init
pub async fn init_payment(
    State(state): State<Arc<PaymentsState>>,
    Json(request): Json<InitPaymentRequest>,
) -> impl IntoResponse {
    let button = match state.buttons.find_by_id(request.button_id).await {
        Ok(Some(button)) => button,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"error": "Button not found"})),
            )
                .into_response();
        }
        Err(e) => {
            error!(button_id = %request.button_id, error = %e, "failed to load button");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal error"})),
            )
                .into_response();
        }
    };

    if !button.is_active {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Button is not active"})),
        )
            .into_response();
    }

    let created = state
        .intents
        .create(
            button.id,
            &button.amount,
            button.token_address.as_deref(),
            button.chain_id,
            &button.merchant_address,
            request.customer_address.as_deref(),
        )
        .await;

    match created {
        Ok(intent) => {
            info!(
                payment_intent_id = %intent.id,
                button_id = %button.id,
                chain_id = intent.chain_id,
                merchant = %mask_address(&intent.merchant_address),
                "payment intent created"
            );
            (StatusCode::OK, Json(PaymentIntentView::from(intent))).into_response()
        }
        Err(e) => {
            error!(button_id = %button.id, error = %e, "failed to create payment intent");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal error"})),
            )
                .into_response()
        }
    }
}

/// GET /api/payments/{id}/status
pub async fn payment_status(
    State(state): State<Arc<PaymentsState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.intents.find_by_id(id).await {
        Ok(Some(intent)) => (
            StatusCode::OK,
            Json(json!({
                "id": intent.id,
                "status": intent.status,
                "transactionHash": intent.transaction_hash,
                "confirmedAt": intent.confirmed_at.map(|at| at.to_rfc3339()),
            })),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Payment intent not found"})),
        )
            .into_response(),
        Err(e) => {
            error!(payment_intent_id = %id, error = %e, "failed to load payment intent");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal error"})),
            )
                .into_response()
        }
    }
}

/// PATCH /api/payments/{id}
///
/// Attach the observed transaction hash, move the intent to `processing`,
/// and start monitoring the hash on the intent's chain.
pub async fn attach_transaction_hash(
    State(state): State<Arc<PaymentsState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<AttachHashRequest>,
) -> impl IntoResponse {
    if !is_valid_tx_hash(&request.transaction_hash) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Invalid transaction hash"})),
        )
            .into_response();
    }

    let existing = match state.intents.find_by_id(id).await {
        Ok(Some(intent)) => intent,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"error": "Payment intent not found"})),
            )
                .into_response();
        }
        Err(e) => {
            error!(payment_intent_id = %id, error = %e, "failed to load payment intent");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal error"})),
            )
                .into_response();
        }
    };

    if existing.is_terminal() {
        return (
            StatusCode::CONFLICT,
            Json(json!({"error": "Payment intent already finalized"})),
        )
            .into_response();
    }

    let updated = match state
        .intents
        .attach_tx_hash(id, &request.transaction_hash)
        .await
    {
        Ok(Some(intent)) => intent,
        Ok(None) => {
            // Raced against a terminal write between the read and the update
            return (
                StatusCode::CONFLICT,
                Json(json!({"error": "Payment intent already finalized"})),
            )
                .into_response();
        }
        Err(e) => {
            error!(payment_intent_id = %id, error = %e, "failed to attach transaction hash");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal error"})),
            )
                .into_response();
        }
    };

    let chain_id = updated.chain_id as u64;
    if let Err(MonitorError::UnsupportedChain { .. }) =
        state
            .monitor
            .start_monitoring(updated.id, request.transaction_hash.clone(), chain_id)
    {
        warn!(
            payment_intent_id = %id,
            chain_id = chain_id,
            "intent chain has no registered client"
        );
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Unsupported chain"})),
        )
            .into_response();
    }

    info!(
        payment_intent_id = %id,
        tx_hash = %request.transaction_hash,
        "transaction hash attached, monitoring started"
    );
    (StatusCode::OK, Json(PaymentIntentView::from(updated))).into_response()
}
