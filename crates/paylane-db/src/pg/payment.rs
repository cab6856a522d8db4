//! PostgreSQL payment repository implementation

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use paylane_types::{Payment, PaymentStatus};

use crate::error::{DbError, DbResult};
use crate::models::PaymentRow;
use crate::repo::{CreatePayment, PaymentRepository, Transition};

const PAYMENT_COLUMNS: &str = "id, provider_ref, provider, amount, fee_amount, merchant_amount, \
     status, status_reason, order_ref, merchant_id, disbursement_id, created_at, completed_at";

/// PostgreSQL payment repository
#[derive(Clone)]
pub struct PgPaymentRepository {
    pool: PgPool,
}

impl PgPaymentRepository {
    /// Create a new payment repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentRepository for PgPaymentRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Payment::try_from).transpose()
    }

    async fn find_by_provider_ref(&self, provider_ref: &str) -> DbResult<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE provider_ref = $1"
        ))
        .bind(provider_ref)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Payment::try_from).transpose()
    }

    async fn create(&self, payment: CreatePayment) -> DbResult<Payment> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            INSERT INTO payments (id, provider_ref, provider, amount, fee_amount,
                                  merchant_amount, status, order_ref, merchant_id)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, $8)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment.id)
        .bind(&payment.provider_ref)
        .bind(payment.provider.as_str())
        .bind(payment.amount)
        .bind(payment.fee_amount)
        .bind(payment.merchant_amount)
        .bind(&payment.order_ref)
        .bind(payment.merchant_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::from_sqlx(e, "payment"))?;

        Payment::try_from(row)
    }

    async fn transition(
        &self,
        provider_ref: &str,
        from: &[PaymentStatus],
        to: PaymentStatus,
        reason: Option<&str>,
    ) -> DbResult<Transition<PaymentStatus>> {
        let from_statuses: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();

        // Single guarded UPDATE: the WHERE clause is the idempotency check
        // and the mutation is atomic with it. Every payment target status is
        // terminal, so the completion timestamp is stamped on apply.
        let applied = sqlx::query_scalar::<_, String>(
            r#"
            UPDATE payments
            SET status = $2,
                status_reason = COALESCE($3, status_reason),
                completed_at = COALESCE(completed_at, NOW())
            WHERE provider_ref = $1 AND status = ANY($4)
            RETURNING status
            "#,
        )
        .bind(provider_ref)
        .bind(to.as_str())
        .bind(reason)
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
                    "SELECT status FROM payments WHERE provider_ref = $1",
                )
                .bind(provider_ref)
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

    async fn link_disbursement(&self, id: Uuid, disbursement_id: Uuid) -> DbResult<()> {
        sqlx::query("UPDATE payments SET disbursement_id = $1 WHERE id = $2")
            .bind(disbursement_id)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
