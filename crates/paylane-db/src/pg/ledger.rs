//! PostgreSQL webhook delivery ledger

use async_trait::async_trait;
use sqlx::PgPool;

use paylane_types::Provider;

use crate::error::DbResult;
use crate::repo::EventLedger;

/// PostgreSQL webhook event ledger
#[derive(Clone)]
pub struct PgEventLedger {
    pool: PgPool,
}

impl PgEventLedger {
    /// Create a new event ledger
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventLedger for PgEventLedger {
    async fn record(
        &self,
        provider: Provider,
        fingerprint: &str,
        event_type: &str,
    ) -> DbResult<bool> {
        // First insert wins; redeliveries hit the conflict and report false.
        let result = sqlx::query(
            r#"
            INSERT INTO webhook_events (provider, fingerprint, event_type)
            VALUES ($1, $2, $3)
            ON CONFLICT (provider, fingerprint) DO NOTHING
            "#,
        )
        .bind(provider.as_str())
        .bind(fingerprint)
        .bind(event_type)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
