//! Disbursement initiation
//!
//! Runs after a payment wins its `pending -> completed` transition. The
//! payment's settlement is never coupled to the payout: a provider
//! failure here leaves the payment completed and the disbursement marked
//! `error` for the ops reconciliation queue.

use std::sync::Arc;

use tracing::{error, info, instrument};
use uuid::Uuid;

use paylane_db::{
    CreateDisbursement, DbError, DisbursementRepository, PaymentRepository,
};
use paylane_types::{Disbursement, Merchant, Payment};

use crate::error::ReconError;
use crate::providers::{BankApi, DisbursementRequest};

/// Creates disbursements for completed payments
pub struct DisbursementInitiator {
    bank: Arc<dyn BankApi>,
    payments: Arc<dyn PaymentRepository>,
    disbursements: Arc<dyn DisbursementRepository>,
}

impl DisbursementInitiator {
    /// Create a new initiator
    pub fn new(
        bank: Arc<dyn BankApi>,
        payments: Arc<dyn PaymentRepository>,
        disbursements: Arc<dyn DisbursementRepository>,
    ) -> Self {
        Self {
            bank,
            payments,
            disbursements,
        }
    }

    /// Pay out the merchant portion of a completed payment.
    ///
    /// The caller holds the `applied=true` side of the completion
    /// transition, so this runs at most once per payment under races; the
    /// unique disbursement-per-payment constraint backs that up.
    #[instrument(skip(self, payment, merchant), fields(payment_id = %payment.id))]
    pub async fn initiate(
        &self,
        payment: &Payment,
        merchant: &Merchant,
    ) -> Result<Disbursement, ReconError> {
        let bank_details = merchant.payout_bank().ok_or_else(|| {
            ReconError::SideEffect(format!(
                "merchant {} has no verified bank details",
                merchant.id
            ))
        })?;

        let disbursement = match self
            .disbursements
            .create(CreateDisbursement {
                id: Uuid::new_v4(),
                payment_id: payment.id,
                amount: payment.merchant_amount,
                bank_code: bank_details.bank_code.clone(),
                account_number: bank_details.account_number.clone(),
                account_name: bank_details.account_name.clone(),
                account_type: bank_details.account_type,
            })
            .await
        {
            Ok(d) => d,
            Err(DbError::Duplicate(_)) => {
                // Another path already created it; nothing more to do.
                return self
                    .disbursements
                    .find_by_payment_id(payment.id)
                    .await?
                    .ok_or_else(|| ReconError::Database(DbError::NotFound));
            }
            Err(e) => return Err(e.into()),
        };

        self.payments
            .link_disbursement(payment.id, disbursement.id)
            .await?;

        let receipt = match self
            .bank
            .create_disbursement(DisbursementRequest {
                amount: disbursement.amount,
                bank_code: disbursement.bank_code.clone(),
                account_number: disbursement.account_number.clone(),
                account_name: disbursement.account_name.clone(),
                account_type: disbursement.account_type,
                idempotency_ref: disbursement.id.to_string(),
                payment_ref: payment.provider_ref.clone(),
            })
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => {
                self.disbursements
                    .mark_error(disbursement.id, &e.to_string())
                    .await?;
                metrics::counter!("recon_disbursements_failed_total").increment(1);
                error!(
                    disbursement_id = %disbursement.id,
                    error = %e,
                    "disbursement submission failed; flagged for ops reconciliation"
                );
                return Err(e);
            }
        };

        self.disbursements
            .set_provider_ref(disbursement.id, &receipt.provider_ref)
            .await?;
        metrics::counter!("recon_disbursements_created_total").increment(1);
        info!(
            disbursement_id = %disbursement.id,
            provider_ref = %receipt.provider_ref,
            amount = disbursement.amount,
            "disbursement submitted"
        );

        Ok(Disbursement {
            provider_ref: Some(receipt.provider_ref),
            ..disbursement
        })
    }
}
