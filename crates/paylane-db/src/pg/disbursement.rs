//! PostgreSQL disbursement repository implementation

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use paylane_types::{Disbursement, DisbursementStatus};

use crate::error::{DbError, DbResult};
use crate::models::DisbursementRow;
use crate::repo::{CreateDisbursement, DisbursementRepository, Transition};

const DISBURSEMENT_COLUMNS: &str = "id, payment_id, provider_ref, amount, bank_code, \
     account_number, account_name, account_type, status, failure_reason, submitted_at, \
     completed_at";

/// PostgreSQL disbursement repository
#[derive(Clone)]
pub struct PgDisbursementRepository {
    pool: PgPool,
}

impl PgDisbursementRepository {
    /// Create a new disbursement repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DisbursementRepository for PgDisbursementRepository {
    async fn find_by_payment_id(&self, payment_id: Uuid) -> DbResult<Option<Disbursement>> {
        let row = sqlx::query_as::<_, DisbursementRow>(&format!(
            "SELECT {DISBURSEMENT_COLUMNS} FROM disbursements WHERE payment_id = $1"
        ))
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Disbursement::try_from).transpose()
    }

    async fn find_by_provider_ref(&self, provider_ref: &str) -> DbResult<Option<Disbursement>> {
        let row = sqlx::query_as::<_, DisbursementRow>(&format!(
            "SELECT {DISBURSEMENT_COLUMNS} FROM disbursements WHERE provider_ref = $1"
        ))
        .bind(provider_ref)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Disbursement::try_from).transpose()
    }

    async fn create(&self, disbursement: CreateDisbursement) -> DbResult<Disbursement> {
        // The unique index on payment_id backs the one-payout-per-payment
        // invariant even if two completion paths both reach creation.
        let row = sqlx::query_as::<_, DisbursementRow>(&format!(
            r#"
            INSERT INTO disbursements (id, payment_id, amount, bank_code, account_number,
                                       account_name, account_type, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'submitted')
            RETURNING {DISBURSEMENT_COLUMNS}
            "#
        ))
        .bind(disbursement.id)
        .bind(disbursement.payment_id)
        .bind(disbursement.amount)
        .bind(&disbursement.bank_code)
        .bind(&disbursement.account_number)
        .bind(&disbursement.account_name)
        .bind(disbursement.account_type.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::from_sqlx(e, "disbursement"))?;

        Disbursement::try_from(row)
    }

    async fn set_provider_ref(&self, id: Uuid, provider_ref: &str) -> DbResult<()> {
        sqlx::query("UPDATE disbursements SET provider_ref = $1 WHERE id = $2")
            .bind(provider_ref)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn transition(
        &self,
        provider_ref: &str,
        from: &[DisbursementStatus],
        to: DisbursementStatus,
        failure_reason: Option<&str>,
    ) -> DbResult<Transition<DisbursementStatus>> {
        let from_statuses: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();

        let applied = sqlx::query_scalar::<_, String>(
            r#"
            UPDATE disbursements
            SET status = $2,
                failure_reason = COALESCE($3, failure_reason),
                completed_at = CASE WHEN $2 IN ('completed', 'error', 'cancelled', 'reversed')
                                    THEN NOW() ELSE completed_at END
            WHERE provider_ref = $1 AND status = ANY($4)
            RETURNING status
            "#,
        )
        .bind(provider_ref)
        .bind(to.as_str())
        .bind(failure_reason)
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
                    "SELECT status FROM disbursements WHERE provider_ref = $1",
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

    async fn mark_error(&self, id: Uuid, reason: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE disbursements
            SET status = 'error', failure_reason = $1, completed_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(reason)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
