use crate::database::error::DatabaseError;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Payment intent lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentIntentStatus {
    Pending,
    Processing,
    Confirmed,
    Failed,
}

impl PaymentIntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentIntentStatus::Pending => "pending",
            PaymentIntentStatus::Processing => "processing",
            PaymentIntentStatus::Confirmed => "confirmed",
            PaymentIntentStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentIntentStatus::Pending),
            "processing" => Some(PaymentIntentStatus::Processing),
            "confirmed" => Some(PaymentIntentStatus::Confirmed),
            "failed" => Some(PaymentIntentStatus::Failed),
            _ => None,
        }
    }

    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentIntentStatus::Confirmed | PaymentIntentStatus::Failed
        )
    }
}

impl std::fmt::Display for PaymentIntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment intent entity
///
/// `amount` is a base-10 integer in the asset's smallest unit (wei or token
/// base units), stored as text and only ever compared as an integer.
#[derive(Debug, Clone, FromRow)]
pub struct PaymentIntent {
    pub id: Uuid,
    pub button_id: Uuid,
    pub amount: String,
    pub token_address: Option<String>,
    pub chain_id: i64,
    pub merchant_address: String,
    pub customer_address: Option<String>,
    pub transaction_hash: Option<String>,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub confirmed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl PaymentIntent {
    pub fn status(&self) -> Option<PaymentIntentStatus> {
        PaymentIntentStatus::from_str(&self.status)
    }

    pub fn is_terminal(&self) -> bool {
        self.status()
            .map(|status| status.is_terminal())
            .unwrap_or(false)
    }
}

/// Repository for payment intents
///
/// Terminal protection lives in the SQL: every transition carries a
/// `status NOT IN ('confirmed', 'failed')` guard, so a confirmed or failed
/// intent silently wins any race against a late writer.
pub struct PaymentIntentRepository {
    pool: PgPool,
}

impl PaymentIntentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a pending intent mirroring its button's payment terms
    pub async fn create(
        &self,
        button_id: Uuid,
        amount: &str,
        token_address: Option<&str>,
        chain_id: i64,
        merchant_address: &str,
        customer_address: Option<&str>,
    ) -> Result<PaymentIntent, DatabaseError> {
        sqlx::query_as::<_, PaymentIntent>(
            "INSERT INTO payment_intents \
             (button_id, amount, token_address, chain_id, merchant_address, customer_address, status) \
             VALUES ($1, $2, $3, $4, $5, $6, 'pending') \
             RETURNING id, button_id, amount, token_address, chain_id, merchant_address, \
                       customer_address, transaction_hash, status, created_at, confirmed_at",
        )
        .bind(button_id)
        .bind(amount)
        .bind(token_address)
        .bind(chain_id)
        .bind(merchant_address)
        .bind(customer_address)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<PaymentIntent>, DatabaseError> {
        sqlx::query_as::<_, PaymentIntent>(
            "SELECT id, button_id, amount, token_address, chain_id, merchant_address, \
                    customer_address, transaction_hash, status, created_at, confirmed_at \
             FROM payment_intents WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Attach the observed transaction hash and move the intent to
    /// `processing`.
    ///
    /// Returns `None` when the intent is missing or already terminal.
    pub async fn attach_tx_hash(
        &self,
        id: Uuid,
        tx_hash: &str,
    ) -> Result<Option<PaymentIntent>, DatabaseError> {
        sqlx::query_as::<_, PaymentIntent>(
            "UPDATE payment_intents \
             SET transaction_hash = $2, status = 'processing' \
             WHERE id = $1 AND status NOT IN ('confirmed', 'failed') \
             RETURNING id, button_id, amount, token_address, chain_id, merchant_address, \
                       customer_address, transaction_hash, status, created_at, confirmed_at",
        )
        .bind(id)
        .bind(tx_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Move the intent to `confirmed` and stamp the confirmation time.
    ///
    /// Returns `None` when the intent is missing or already terminal, which
    /// makes a duplicate confirmation a no-op rather than a second write.
    pub async fn mark_confirmed(&self, id: Uuid) -> Result<Option<PaymentIntent>, DatabaseError> {
        sqlx::query_as::<_, PaymentIntent>(
            "UPDATE payment_intents \
             SET status = 'confirmed', confirmed_at = NOW() \
             WHERE id = $1 AND status NOT IN ('confirmed', 'failed') \
             RETURNING id, button_id, amount, token_address, chain_id, merchant_address, \
                       customer_address, transaction_hash, status, created_at, confirmed_at",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Move the intent to `failed`. No-op on missing or terminal intents.
    pub async fn mark_failed(&self, id: Uuid) -> Result<Option<PaymentIntent>, DatabaseError> {
        sqlx::query_as::<_, PaymentIntent>(
            "UPDATE payment_intents \
             SET status = 'failed' \
             WHERE id = $1 AND status NOT IN ('confirmed', 'failed') \
             RETURNING id, button_id, amount, token_address, chain_id, merchant_address, \
                       customer_address, transaction_hash, status, created_at, confirmed_at",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            PaymentIntentStatus::Pending,
            PaymentIntentStatus::Processing,
            PaymentIntentStatus::Confirmed,
            PaymentIntentStatus::Failed,
        ] {
            assert_eq!(PaymentIntentStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(PaymentIntentStatus::from_str("unknown"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!PaymentIntentStatus::Pending.is_terminal());
        assert!(!PaymentIntentStatus::Processing.is_terminal());
        assert!(PaymentIntentStatus::Confirmed.is_terminal());
        assert!(PaymentIntentStatus::Failed.is_terminal());
    }

    #[test]
    fn test_intent_terminal_helper() {
        let mut intent = sample_intent();
        assert!(!intent.is_terminal());

        intent.status = "confirmed".to_string();
        assert!(intent.is_terminal());

        intent.status = "failed".to_string();
        assert!(intent.is_terminal());

        // Unrecognized statuses are conservatively treated as non-terminal
        intent.status = "garbage".to_string();
        assert!(!intent.is_terminal());
    }

    fn sample_intent() -> PaymentIntent {
        PaymentIntent {
            id: Uuid::new_v4(),
            button_id: Uuid::new_v4(),
            amount: "1000000".to_string(),
            token_address: None,
            chain_id: 1,
            merchant_address: "0x742d35Cc6634C0532925a3b844Bc454e4438f44e".to_string(),
            customer_address: None,
            transaction_hash: None,
            status: "pending".to_string(),
            created_at: chrono::Utc::now(),
            confirmed_at: None,
        }
    }
}
