//! Merchant types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AccountType;

/// Verified bank details for payouts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankDetails {
    /// Bank branch/universal code
    pub bank_code: String,
    /// Account number
    pub account_number: String,
    /// Account holder name
    pub account_name: String,
    /// Account type
    pub account_type: AccountType,
    /// Whether the details passed account verification
    pub verified: bool,
}

/// A merchant receiving payouts
///
/// Read-only from the reconciliation engine's point of view; onboarding
/// owns the writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Merchant {
    /// Merchant ID
    pub id: Uuid,
    /// Trading name
    pub business_name: String,
    /// Bank details on file, if any
    pub bank: Option<BankDetails>,
}

impl Merchant {
    /// Bank details usable for a payout (present and verified)
    pub fn payout_bank(&self) -> Option<&BankDetails> {
        self.bank.as_ref().filter(|b| b.verified)
    }
}
