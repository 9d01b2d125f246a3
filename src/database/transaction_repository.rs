use crate::database::error::DatabaseError;
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// How long a pull-flow transaction may sit pending before it is written
/// off as failed.
const PENDING_TTL_MINUTES: i64 = 10;

/// Pull-flow transaction states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransactionStatus::Pending),
            "success" => Some(TransactionStatus::Success),
            "failed" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }
}

/// Legacy two-party "pull" transaction entity
///
/// The payer is identified by an off-chain profile email instead of a
/// submitted hash, so these records expire by age rather than by receipt.
#[derive(Debug, Clone, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub from_email: String,
    pub to_address: String,
    pub signature: Option<String>,
    pub status: String,
    pub button_id: Uuid,
    pub amount_usd: f64,
    pub created_at: DateTime<Utc>,
}

/// True when a still-pending record created at `created_at` has outlived
/// the TTL as of `now`.
pub fn is_stale(created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - created_at > Duration::minutes(PENDING_TTL_MINUTES)
}

fn stale_cutoff() -> DateTime<Utc> {
    Utc::now() - Duration::minutes(PENDING_TTL_MINUTES)
}

/// Repository for pull-flow transactions
///
/// Stale reaping happens lazily on every read path: pending rows past the
/// TTL are flipped to failed inside the same database transaction that
/// serves the read, so no caller ever observes an expired pending record.
pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a pending transaction
    pub async fn create(
        &self,
        from_email: &str,
        to_address: &str,
        button_id: Uuid,
        amount_usd: f64,
    ) -> Result<Transaction, DatabaseError> {
        sqlx::query_as::<_, Transaction>(
            "INSERT INTO transactions (from_email, to_address, button_id, amount_usd, status) \
             VALUES ($1, $2, $3, $4, 'pending') \
             RETURNING id, from_email, to_address, signature, status, button_id, amount_usd, created_at",
        )
        .bind(from_email)
        .bind(to_address)
        .bind(button_id)
        .bind(amount_usd)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// List a sender's transactions, newest first, reaping stale pendings
    /// before they are returned.
    pub async fn list_by_sender(
        &self,
        from_email: &str,
    ) -> Result<Vec<Transaction>, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        sqlx::query(
            "UPDATE transactions SET status = 'failed' \
             WHERE from_email = $1 AND status = 'pending' AND created_at < $2",
        )
        .bind(from_email)
        .bind(stale_cutoff())
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let transactions = sqlx::query_as::<_, Transaction>(
            "SELECT id, from_email, to_address, signature, status, button_id, amount_usd, created_at \
             FROM transactions WHERE from_email = $1 ORDER BY created_at DESC",
        )
        .bind(from_email)
        .fetch_all(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(transactions)
    }

    /// Fetch a transaction by id, reaping it first if it went stale.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Transaction>, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        sqlx::query(
            "UPDATE transactions SET status = 'failed' \
             WHERE id = $1 AND status = 'pending' AND created_at < $2",
        )
        .bind(id)
        .bind(stale_cutoff())
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let transaction = sqlx::query_as::<_, Transaction>(
            "SELECT id, from_email, to_address, signature, status, button_id, amount_usd, created_at \
             FROM transactions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(transaction)
    }

    /// Settle a transaction manually, optionally recording the payer's
    /// signature. Pending rows only; settled rows keep their outcome.
    pub async fn update_status(
        &self,
        id: Uuid,
        status: TransactionStatus,
        signature: Option<&str>,
    ) -> Result<Option<Transaction>, DatabaseError> {
        sqlx::query_as::<_, Transaction>(
            "UPDATE transactions \
             SET status = $2, signature = COALESCE($3, signature) \
             WHERE id = $1 AND status = 'pending' \
             RETURNING id, from_email, to_address, signature, status, button_id, amount_usd, created_at",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(signature)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_status_round_trip() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Success,
            TransactionStatus::Failed,
        ] {
            assert_eq!(TransactionStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(TransactionStatus::from_str("confirmed"), None);
    }

    #[test]
    fn test_staleness_boundary() {
        let now = Utc::now();

        let eleven_minutes_old = now - Duration::minutes(11);
        assert!(is_stale(eleven_minutes_old, now));

        let nine_minutes_old = now - Duration::minutes(9);
        assert!(!is_stale(nine_minutes_old, now));

        // Exactly at the TTL is not yet stale
        let at_ttl = now - Duration::minutes(PENDING_TTL_MINUTES);
        assert!(!is_stale(at_ttl, now));
    }
}
