//! PostgreSQL entitlement repository implementation

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use paylane_types::Capability;

use crate::error::{DbError, DbResult};
use crate::repo::EntitlementRepository;

/// PostgreSQL entitlement repository
#[derive(Clone)]
pub struct PgEntitlementRepository {
    pool: PgPool,
}

impl PgEntitlementRepository {
    /// Create a new entitlement repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntitlementRepository for PgEntitlementRepository {
    async fn replace_for_subscription(
        &self,
        subscription_id: Uuid,
        capabilities: &[Capability],
    ) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM subscription_capabilities WHERE subscription_id = $1")
            .bind(subscription_id)
            .execute(&mut *tx)
            .await?;

        for capability in capabilities {
            sqlx::query(
                "INSERT INTO subscription_capabilities (subscription_id, capability) VALUES ($1, $2)",
            )
            .bind(subscription_id)
            .bind(capability.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_for_subscription(&self, subscription_id: Uuid) -> DbResult<Vec<Capability>> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT capability FROM subscription_capabilities WHERE subscription_id = $1 ORDER BY capability",
        )
        .bind(subscription_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|c| c.parse().map_err(DbError::decode))
            .collect()
    }
}
