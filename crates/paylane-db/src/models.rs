//! Database row models
//!
//! These types map directly to database rows using SQLx's FromRow derive.
//! Statuses are stored as text; conversion into the typed domain structs
//! happens here so a corrupt row surfaces as a decode error instead of a
//! panic deep in the engine.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use paylane_types::{
    AccountType, BankDetails, Disbursement, Merchant, Payment, Subscription,
};

use crate::error::DbError;

/// Payment row from the database
#[derive(Debug, Clone, FromRow)]
pub struct PaymentRow {
    pub id: Uuid,
    pub provider_ref: String,
    pub provider: String,
    pub amount: i64,
    pub fee_amount: i64,
    pub merchant_amount: i64,
    pub status: String,
    pub status_reason: Option<String>,
    pub order_ref: String,
    pub merchant_id: Uuid,
    pub disbursement_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DbError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: row.id,
            provider_ref: row.provider_ref,
            provider: row.provider.parse().map_err(DbError::decode)?,
            amount: row.amount,
            fee_amount: row.fee_amount,
            merchant_amount: row.merchant_amount,
            status: row.status.parse().map_err(DbError::decode)?,
            status_reason: row.status_reason,
            order_ref: row.order_ref,
            merchant_id: row.merchant_id,
            disbursement_id: row.disbursement_id,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

/// Subscription row from the database
#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: String,
    pub reference: String,
    pub subscription_code: Option<String>,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DbError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(Subscription {
            id: row.id,
            user_id: row.user_id,
            plan: row.plan.parse().map_err(DbError::decode)?,
            reference: row.reference,
            subscription_code: row.subscription_code,
            status: row.status.parse().map_err(DbError::decode)?,
            started_at: row.started_at,
            expires_at: row.expires_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Disbursement row from the database
#[derive(Debug, Clone, FromRow)]
pub struct DisbursementRow {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub provider_ref: Option<String>,
    pub amount: i64,
    pub bank_code: String,
    pub account_number: String,
    pub account_name: String,
    pub account_type: String,
    pub status: String,
    pub failure_reason: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<DisbursementRow> for Disbursement {
    type Error = DbError;

    fn try_from(row: DisbursementRow) -> Result<Self, Self::Error> {
        let account_type: AccountType = row
            .account_type
            .parse()
            .unwrap_or(AccountType::Current);
        Ok(Disbursement {
            id: row.id,
            payment_id: row.payment_id,
            provider_ref: row.provider_ref,
            amount: row.amount,
            bank_code: row.bank_code,
            account_number: row.account_number,
            account_name: row.account_name,
            account_type,
            status: row.status.parse().map_err(DbError::decode)?,
            failure_reason: row.failure_reason,
            submitted_at: row.submitted_at,
            completed_at: row.completed_at,
        })
    }
}

/// Merchant row from the database
#[derive(Debug, Clone, FromRow)]
pub struct MerchantRow {
    pub id: Uuid,
    pub business_name: String,
    pub bank_code: Option<String>,
    pub account_number: Option<String>,
    pub account_name: Option<String>,
    pub account_type: Option<String>,
    pub bank_verified: bool,
}

impl From<MerchantRow> for Merchant {
    fn from(row: MerchantRow) -> Self {
        let bank = match (row.bank_code, row.account_number, row.account_name) {
            (Some(bank_code), Some(account_number), Some(account_name)) => Some(BankDetails {
                bank_code,
                account_number,
                account_name,
                account_type: row
                    .account_type
                    .as_deref()
                    .unwrap_or("current")
                    .parse()
                    .unwrap_or(AccountType::Current),
                verified: row.bank_verified,
            }),
            _ => None,
        };
        Merchant {
            id: row.id,
            business_name: row.business_name,
            bank,
        }
    }
}
