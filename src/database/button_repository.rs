use crate::database::error::DatabaseError;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Payment button entity
///
/// Buttons are authored by the merchant dashboard; the confirmation engine
/// only ever reads them to learn a payment's expected terms.
#[derive(Debug, Clone, FromRow)]
pub struct Button {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Expected amount as a base-10 integer in the asset's smallest unit
    pub amount: String,
    /// ERC-20 contract address; None for native-asset buttons
    pub token_address: Option<String>,
    pub chain_id: i64,
    pub merchant_address: String,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Read-only repository for payment buttons
pub struct ButtonRepository {
    pool: PgPool,
}

impl ButtonRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Button>, DatabaseError> {
        sqlx::query_as::<_, Button>(
            "SELECT id, merchant_id, name, description, amount, token_address, chain_id, \
                    merchant_address, is_active, created_at \
             FROM buttons WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
