//! Disbursement (merchant payout) types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ParseStatusError;

/// Beneficiary bank account type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Savings account
    Savings,
    /// Current/cheque account; anything unrecognized defaults here
    #[serde(other)]
    Current,
}

impl AccountType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Savings => "savings",
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AccountType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "savings" => Ok(Self::Savings),
            _ => Ok(Self::Current),
        }
    }
}

/// Disbursement status
///
/// `Paused` may still move to `Completed` or `Cancelled`; every other
/// non-`Submitted` status is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisbursementStatus {
    /// Payout instruction sent to the provider
    Submitted,
    /// Funds delivered to the merchant account
    Completed,
    /// Provider rejected or could not process the payout
    Error,
    /// Provider put the payout on hold
    Paused,
    /// Payout cancelled before completion
    Cancelled,
    /// Funds returned after completion
    Reversed,
}

impl DisbursementStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Paused => "paused",
            Self::Cancelled => "cancelled",
            Self::Reversed => "reversed",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Submitted | Self::Paused)
    }
}

impl std::fmt::Display for DisbursementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DisbursementStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(Self::Submitted),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            "paused" => Ok(Self::Paused),
            "cancelled" => Ok(Self::Cancelled),
            "reversed" => Ok(Self::Reversed),
            other => Err(ParseStatusError::new("disbursement status", other)),
        }
    }
}

/// One payout instruction moving a payment's merchant portion to the
/// merchant's bank account. At most one exists per payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Disbursement {
    /// Disbursement ID
    pub id: Uuid,
    /// Payment being paid out
    pub payment_id: Uuid,
    /// Payout ID at the provider, once submitted
    pub provider_ref: Option<String>,
    /// Amount in minor units (the payment's merchant portion)
    pub amount: i64,
    /// Beneficiary bank code
    pub bank_code: String,
    /// Beneficiary account number
    pub account_number: String,
    /// Beneficiary account holder name
    pub account_name: String,
    /// Beneficiary account type
    pub account_type: AccountType,
    /// Payout status
    pub status: DisbursementStatus,
    /// Provider-supplied failure reason
    pub failure_reason: Option<String>,
    /// When the payout was submitted
    pub submitted_at: DateTime<Utc>,
    /// When the payout reached a terminal status
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_account_type_defaults_to_current() {
        assert_eq!("cheque".parse::<AccountType>().unwrap(), AccountType::Current);
        assert_eq!("savings".parse::<AccountType>().unwrap(), AccountType::Savings);

        let parsed: AccountType = serde_json::from_str("\"transmission\"").unwrap();
        assert_eq!(parsed, AccountType::Current);
    }

    #[test]
    fn paused_is_not_terminal() {
        assert!(!DisbursementStatus::Paused.is_terminal());
        assert!(DisbursementStatus::Reversed.is_terminal());
    }
}
