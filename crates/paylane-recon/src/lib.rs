//! Paylane Recon - Payment & subscription reconciliation engine
//!
//! Ingests at-least-once, unordered webhook deliveries from the card
//! provider (Paystack) and the bank-EFT provider (Stitch), verifies their
//! authenticity, normalizes them into canonical events and drives the
//! payment, subscription and disbursement state machines through the
//! storage layer's atomic conditional transitions. A payment reaching
//! `completed` triggers the merchant payout exactly once.
//!
//! # Example
//!
//! ```rust,ignore
//! use paylane_recon::{normalize, Reconciler, SignatureVerifier};
//!
//! verifier.verify(Provider::Paystack, &body, signature_header)?;
//! let event = normalize(Provider::Paystack, &body)?;
//! let outcome = reconciler.process_webhook(event).await?;
//! ```

pub mod config;
pub mod error;
pub mod fees;
pub mod normalize;
pub mod orchestrator;
pub mod payout;
pub mod providers;
pub mod signature;

pub use config::ReconConfig;
pub use error::ReconError;
pub use normalize::{normalize, EventKind, WebhookEvent};
pub use orchestrator::{CallbackOutcome, ReconOutcome, Reconciler, Stores};
pub use payout::DisbursementInitiator;
pub use providers::{
    BankApi, CardApi, DisbursementReceipt, DisbursementRequest, PaystackClient,
    ProviderPaymentStatus, StitchClient,
};
pub use signature::{SignatureVerifier, WebhookSecret};
