//! PostgreSQL subscription repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use paylane_types::{Subscription, SubscriptionStatus};

use crate::error::{DbError, DbResult};
use crate::models::SubscriptionRow;
use crate::repo::{CreateSubscription, SubscriptionRepository, Transition};

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, plan, reference, subscription_code, status, \
     started_at, expires_at, created_at, updated_at";

/// PostgreSQL subscription repository
#[derive(Clone)]
pub struct PgSubscriptionRepository {
    pool: PgPool,
}

impl PgSubscriptionRepository {
    /// Create a new subscription repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionRepository for PgSubscriptionRepository {
    async fn find_by_reference(&self, reference: &str) -> DbResult<Option<Subscription>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE reference = $1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Subscription::try_from).transpose()
    }

    async fn find_by_subscription_code(&self, code: &str) -> DbResult<Option<Subscription>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE subscription_code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Subscription::try_from).transpose()
    }

    async fn find_current_by_user(&self, user_id: Uuid) -> DbResult<Option<Subscription>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            r#"
            SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
            WHERE user_id = $1 AND status IN ('active', 'trialing')
            ORDER BY created_at DESC
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Subscription::try_from).transpose()
    }

    async fn create(&self, sub: CreateSubscription) -> DbResult<Subscription> {
        // Re-checkout with the same reference supersedes a subscription
        // that never left trialing; one that progressed is protected, and
        // the partial unique index keeps a user to one live subscription.
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            r#"
            INSERT INTO subscriptions (id, user_id, plan, reference, status)
            VALUES ($1, $2, $3, $4, 'trialing')
            ON CONFLICT (reference) DO UPDATE
                SET user_id = EXCLUDED.user_id,
                    plan = EXCLUDED.plan,
                    updated_at = NOW()
                WHERE subscriptions.status = 'trialing'
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(sub.id)
        .bind(sub.user_id)
        .bind(sub.plan.as_str())
        .bind(&sub.reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DbError::from_sqlx(e, "subscription"))?
        .ok_or_else(|| DbError::Duplicate(format!("subscription {}", sub.reference)))?;

        Subscription::try_from(row)
    }

    async fn transition(
        &self,
        reference: &str,
        from: &[SubscriptionStatus],
        to: SubscriptionStatus,
        expires_at: Option<DateTime<Utc>>,
    ) -> DbResult<Transition<SubscriptionStatus>> {
        let from_statuses: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();

        let applied = sqlx::query_scalar::<_, String>(
            r#"
            UPDATE subscriptions
            SET status = $2,
                started_at = CASE WHEN $2 = 'active' THEN COALESCE(started_at, NOW())
                                  ELSE started_at END,
                expires_at = COALESCE($3, expires_at),
                updated_at = NOW()
            WHERE reference = $1 AND status = ANY($4)
            RETURNING status
            "#,
        )
        .bind(reference)
        .bind(to.as_str())
        .bind(expires_at)
        .bind(&from_statuses)
        .fetch_optional(&self.pool)
        .await?;

        match applied {
            Some(status) => Ok(Transition {
                applied: true,
                status: status.parse().map_err(DbError::decode)?,
            }),
            None => {
                let current = sqlx::query_scalar::<_, String>(
                    "SELECT status FROM subscriptions WHERE reference = $1",
                )
                .bind(reference)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(DbError::NotFound)?;

                Ok(Transition {
                    applied: false,
                    status: current.parse().map_err(DbError::decode)?,
                })
            }
        }
    }

    async fn set_subscription_code(&self, reference: &str, code: &str) -> DbResult<()> {
        sqlx::query(
            "UPDATE subscriptions SET subscription_code = $1, updated_at = NOW() WHERE reference = $2",
        )
        .bind(code)
        .bind(reference)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn expire_overdue(&self, now: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = 'expired', updated_at = NOW()
            WHERE status = 'active' AND expires_at IS NOT NULL AND expires_at <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
