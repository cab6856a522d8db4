//! Engine errors

use thiserror::Error;

use paylane_db::DbError;

/// Reconciliation errors
///
/// Everything a webhook or callback can fail with resolves to one of
/// these; nothing in the engine panics on provider input.
#[derive(Error, Debug)]
pub enum ReconError {
    /// Signature missing or did not match the configured secret
    #[error("webhook signature rejected")]
    AuthFailure,

    /// Body did not parse into a known provider payload
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The verify-before-trust call failed; the entity stays pending and
    /// a later delivery or retry completes reconciliation
    #[error("provider verification failed: {0}")]
    ProviderVerification(String),

    /// Disbursement creation failed after the payment already completed;
    /// the payment is unaffected
    #[error("disbursement failed: {0}")]
    SideEffect(String),

    /// Storage error
    #[error("database error: {0}")]
    Database(#[from] DbError),
}

impl ReconError {
    /// Whether the upstream provider's retry loop can resolve this
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderVerification(_))
    }
}
