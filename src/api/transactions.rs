//! Legacy pull-flow transaction endpoints
//!
//! The older two-party flow identifies the payer by an off-chain email
//! profile instead of a submitted hash. These records expire by age: the
//! repository reaps pending rows past the TTL on every read, so no stale
//! pending record ever leaves this module.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::database::transaction_repository::{
    Transaction, TransactionRepository, TransactionStatus,
};

pub struct TransactionsState {
    pub transactions: Arc<TransactionRepository>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    pub from_email: String,
    pub to_address: String,
    pub button_id: Uuid,
    pub amount_usd: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTransactionsQuery {
    pub from_email: String,
}

#[derive(Debug, Deserialize)]
pub struct SettleTransactionRequest {
    pub status: String,
    pub signature: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    pub id: Uuid,
    pub from_email: String,
    pub to_address: String,
    pub signature: Option<String>,
    pub status: String,
    pub button_id: Uuid,
    pub amount_usd: f64,
    pub created_at: String,
}

impl From<Transaction> for TransactionView {
    fn from(tx: Transaction) -> Self {
        Self {
            id: tx.id,
            from_email: tx.from_email,
            to_address: tx.to_address,
            signature: tx.signature,
            status: tx.status,
            button_id: tx.button_id,
            amount_usd: tx.amount_usd,
            created_at: tx.created_at.to_rfc3339(),
        }
    }
}

/// POST /api/transactions
pub async fn create_transaction(
    State(state): State<Arc<TransactionsState>>,
    Json(request): Json<CreateTransactionRequest>,
) -> impl IntoResponse {
    if request.from_email.is_empty() || request.to_address.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "fromEmail and toAddress are required"})),
        )
            .into_response();
    }

    match state
        .transactions
        .create(
            &request.from_email,
            &request.to_address,
            request.button_id,
            request.amount_usd,
        )
        .await
    {
        Ok(tx) => {
            info!(
                transaction_id = %tx.id,
                button_id = %tx.button_id,
                "pull-flow transaction created"
            );
            (StatusCode::OK, Json(TransactionView::from(tx))).into_response()
        }
        Err(e) => {
            error!(error = %e, "failed to create pull-flow transaction");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal error"})),
            )
                .into_response()
        }
    }
}

/// GET /api/transactions?fromEmail=...
pub async fn list_transactions(
    State(state): State<Arc<TransactionsState>>,
    Query(query): Query<ListTransactionsQuery>,
) -> impl IntoResponse {
    match state.transactions.list_by_sender(&query.from_email).await {
        Ok(transactions) => {
            let views: Vec<TransactionView> =
                transactions.into_iter().map(TransactionView::from).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(e) => {
            error!(error = %e, "failed to list pull-flow transactions");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal error"})),
            )
                .into_response()
        }
    }
}

/// GET /api/transactions/{id}
pub async fn get_transaction(
    State(state): State<Arc<TransactionsState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.transactions.find_by_id(id).await {
        Ok(Some(tx)) => (StatusCode::OK, Json(TransactionView::from(tx))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Transaction not found"})),
        )
            .into_response(),
        Err(e) => {
            error!(transaction_id = %id, error = %e, "failed to load pull-flow transaction");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal error"})),
            )
                .into_response()
        }
    }
}

/// PATCH /api/transactions/{id}
pub async fn settle_transaction(
    State(state): State<Arc<TransactionsState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<SettleTransactionRequest>,
) -> impl IntoResponse {
    let status = match TransactionStatus::from_str(&request.status) {
        Some(status) if status != TransactionStatus::Pending => status,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "status must be 'success' or 'failed'"})),
            )
                .into_response();
        }
    };

    match state
        .transactions
        .update_status(id, status, request.signature.as_deref())
        .await
    {
        Ok(Some(tx)) => {
            info!(
                transaction_id = %id,
                status = %tx.status,
                "pull-flow transaction settled"
            );
            (StatusCode::OK, Json(TransactionView::from(tx))).into_response()
        }
        Ok(None) => (
            StatusCode::CONFLICT,
            Json(json!({"error": "Transaction is not pending"})),
        )
            .into_response(),
        Err(e) => {
            error!(transaction_id = %id, error = %e, "failed to settle pull-flow transaction");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal error"})),
            )
                .into_response()
        }
    }
}
