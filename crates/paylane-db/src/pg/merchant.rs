//! PostgreSQL merchant repository implementation

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use paylane_types::Merchant;

use crate::error::DbResult;
use crate::models::MerchantRow;
use crate::repo::MerchantRepository;

/// PostgreSQL merchant repository
#[derive(Clone)]
pub struct PgMerchantRepository {
    pool: PgPool,
}

impl PgMerchantRepository {
    /// Create a new merchant repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MerchantRepository for PgMerchantRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<Merchant>> {
        let row = sqlx::query_as::<_, MerchantRow>(
            r#"
            SELECT id, business_name, bank_code, account_number, account_name,
                   account_type, bank_verified
            FROM merchants
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Merchant::from))
    }
}
