use crate::database::error::DatabaseError;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Merchant entity
#[derive(Debug, Clone, FromRow)]
pub struct Merchant {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub wallet_address: Option<String>,
    /// Endpoint notified on terminal payment states; None disables delivery
    pub webhook_url: Option<String>,
    /// Per-merchant signing secret; falls back to the process-wide default
    pub webhook_secret: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Read-only repository for merchants
pub struct MerchantRepository {
    pool: PgPool,
}

impl MerchantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Merchant>, DatabaseError> {
        sqlx::query_as::<_, Merchant>(
            "SELECT id, email, name, wallet_address, webhook_url, webhook_secret, created_at \
             FROM merchants WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
