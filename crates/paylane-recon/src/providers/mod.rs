//! Provider API clients
//!
//! The engine talks to providers through the `CardApi` and `BankApi`
//! traits so tests can substitute mocks; the real implementations are
//! thin reqwest clients with bounded timeouts and a single retry.

mod paystack;
mod stitch;

pub use paystack::PaystackClient;
pub use stitch::StitchClient;

use async_trait::async_trait;

use paylane_types::{AccountType, DisbursementStatus};

use crate::error::ReconError;

/// A provider's authoritative view of a payment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderPaymentStatus {
    /// Funds settled
    Completed,
    /// Still in flight
    Pending,
    /// Charge failed
    Failed,
    /// Charge abandoned or cancelled
    Cancelled,
}

/// Card provider operations (verification)
#[async_trait]
pub trait CardApi: Send + Sync {
    /// Ask the provider for the authoritative status of a charge
    async fn verify_transaction(
        &self,
        reference: &str,
    ) -> Result<ProviderPaymentStatus, ReconError>;
}

/// Payout creation request
#[derive(Debug, Clone)]
pub struct DisbursementRequest {
    /// Amount in minor units
    pub amount: i64,
    /// Beneficiary bank code
    pub bank_code: String,
    /// Beneficiary account number
    pub account_number: String,
    /// Beneficiary account holder name
    pub account_name: String,
    /// Beneficiary account type
    pub account_type: AccountType,
    /// Deduplication reference for the provider (our disbursement ID)
    pub idempotency_ref: String,
    /// The settled payment being paid out
    pub payment_ref: String,
}

/// Provider acknowledgement of a payout submission
#[derive(Debug, Clone)]
pub struct DisbursementReceipt {
    /// Payout ID at the provider
    pub provider_ref: String,
    /// Status the provider reported at submission
    pub status: DisbursementStatus,
}

/// Bank provider operations (verification and payouts)
#[async_trait]
pub trait BankApi: Send + Sync {
    /// Ask the provider for the authoritative status of an EFT payment
    async fn payment_status(
        &self,
        provider_ref: &str,
    ) -> Result<ProviderPaymentStatus, ReconError>;

    /// Submit a payout instruction
    async fn create_disbursement(
        &self,
        request: DisbursementRequest,
    ) -> Result<DisbursementReceipt, ReconError>;
}
