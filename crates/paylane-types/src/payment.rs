//! Payment types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ParseStatusError, Provider};

/// Payment status
///
/// `Pending` is the only non-terminal state; a payment never leaves a
/// terminal state again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Payment initiated, awaiting settlement
    Pending,
    /// Funds received from the customer
    Completed,
    /// Customer abandoned or the provider cancelled the payment
    Cancelled,
    /// Provider reported the payment as failed
    Failed,
}

impl PaymentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    /// Whether no further transition is permitted from this status
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "failed" => Ok(Self::Failed),
            other => Err(ParseStatusError::new("payment status", other)),
        }
    }
}

/// One customer-to-merchant charge
///
/// Amounts are integer minor-currency units. The commission split is
/// computed once when the record is created and is immutable afterwards;
/// `amount == fee_amount + merchant_amount` holds for the whole lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// Internal payment ID
    pub id: Uuid,
    /// Payment ID at the external provider (webhooks carry only this)
    pub provider_ref: String,
    /// Provider that processed the charge
    pub provider: Provider,
    /// Gross amount charged to the customer
    pub amount: i64,
    /// Platform commission portion
    pub fee_amount: i64,
    /// Merchant payout portion
    pub merchant_amount: i64,
    /// Settlement status
    pub status: PaymentStatus,
    /// Provider-supplied reason for the current status
    pub status_reason: Option<String>,
    /// Merchant-facing order reference
    pub order_ref: String,
    /// Merchant receiving the payout
    pub merchant_id: Uuid,
    /// Disbursement created for this payment, if any
    pub disbursement_id: Option<Uuid>,
    /// When the payment was initiated
    pub created_at: DateTime<Utc>,
    /// When the payment reached a terminal status
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(PaymentStatus::Completed.is_terminal());
        assert!(PaymentStatus::Cancelled.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Completed,
            PaymentStatus::Cancelled,
            PaymentStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), status);
        }
        assert!("refunded".parse::<PaymentStatus>().is_err());
    }
}
