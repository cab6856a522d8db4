//! Repository traits
//!
//! Async interfaces the engine programs against. Every mutation that a
//! webhook can trigger goes through `transition`, the conditional-update
//! primitive: the store applies the change only when the row's current
//! status is in `from`, atomically, and reports what happened. Lookups are
//! by the external provider reference because that is all a webhook
//! carries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use paylane_types::{
    Capability, Disbursement, DisbursementStatus, Merchant, Payment, PaymentStatus, PlanKind,
    Provider, Subscription, SubscriptionStatus,
};

use crate::error::DbResult;

/// Outcome of a conditional transition.
///
/// `applied == false` means the row was already outside the expected set;
/// `status` is whatever the row holds now (the winner's status, under
/// races).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition<S> {
    /// Whether this call performed the mutation
    pub applied: bool,
    /// The row's status after the call
    pub status: S,
}

/// Payment repository trait
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Find a payment by internal ID
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<Payment>>;

    /// Find a payment by external provider reference
    async fn find_by_provider_ref(&self, provider_ref: &str) -> DbResult<Option<Payment>>;

    /// Create a new pending payment
    async fn create(&self, payment: CreatePayment) -> DbResult<Payment>;

    /// Atomically move the payment to `to` if its status is in `from`
    async fn transition(
        &self,
        provider_ref: &str,
        from: &[PaymentStatus],
        to: PaymentStatus,
        reason: Option<&str>,
    ) -> DbResult<Transition<PaymentStatus>>;

    /// Record the disbursement created for this payment
    async fn link_disbursement(&self, id: Uuid, disbursement_id: Uuid) -> DbResult<()>;
}

/// Create payment input
#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub id: Uuid,
    pub provider_ref: String,
    pub provider: Provider,
    pub amount: i64,
    pub fee_amount: i64,
    pub merchant_amount: i64,
    pub order_ref: String,
    pub merchant_id: Uuid,
}

/// Subscription repository trait
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Find a subscription by its external billing reference
    async fn find_by_reference(&self, reference: &str) -> DbResult<Option<Subscription>>;

    /// Find a subscription by the provider's recurring billing code
    async fn find_by_subscription_code(&self, code: &str) -> DbResult<Option<Subscription>>;

    /// Find the active or trialing subscription for a user, if any
    async fn find_current_by_user(&self, user_id: Uuid) -> DbResult<Option<Subscription>>;

    /// Create a trialing subscription.
    ///
    /// A prior subscription with the same reference that is still trialing
    /// is superseded in place; one that already progressed is left alone
    /// and the call fails with `Duplicate`.
    async fn create(&self, sub: CreateSubscription) -> DbResult<Subscription>;

    /// Atomically move the subscription to `to` if its status is in `from`.
    ///
    /// Activation stamps `started_at` on first use; `expires_at`, when
    /// given, replaces the stored expiry.
    async fn transition(
        &self,
        reference: &str,
        from: &[SubscriptionStatus],
        to: SubscriptionStatus,
        expires_at: Option<DateTime<Utc>>,
    ) -> DbResult<Transition<SubscriptionStatus>>;

    /// Store the provider's recurring billing code
    async fn set_subscription_code(&self, reference: &str, code: &str) -> DbResult<()>;

    /// Move active subscriptions whose expiry has passed to expired
    async fn expire_overdue(&self, now: DateTime<Utc>) -> DbResult<u64>;
}

/// Create subscription input
#[derive(Debug, Clone)]
pub struct CreateSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: PlanKind,
    pub reference: String,
}

/// Disbursement repository trait
#[async_trait]
pub trait DisbursementRepository: Send + Sync {
    /// Find the disbursement for a payment, if one was created
    async fn find_by_payment_id(&self, payment_id: Uuid) -> DbResult<Option<Disbursement>>;

    /// Find a disbursement by the provider's payout reference
    async fn find_by_provider_ref(&self, provider_ref: &str) -> DbResult<Option<Disbursement>>;

    /// Create a submitted disbursement.
    ///
    /// At most one disbursement may exist per payment; a second create for
    /// the same payment fails with `Duplicate`.
    async fn create(&self, disbursement: CreateDisbursement) -> DbResult<Disbursement>;

    /// Record the provider's payout reference once the submission went out
    async fn set_provider_ref(&self, id: Uuid, provider_ref: &str) -> DbResult<()>;

    /// Atomically move the disbursement to `to` if its status is in `from`
    async fn transition(
        &self,
        provider_ref: &str,
        from: &[DisbursementStatus],
        to: DisbursementStatus,
        failure_reason: Option<&str>,
    ) -> DbResult<Transition<DisbursementStatus>>;

    /// Mark a disbursement as errored after a failed provider call
    async fn mark_error(&self, id: Uuid, reason: &str) -> DbResult<()>;
}

/// Create disbursement input
#[derive(Debug, Clone)]
pub struct CreateDisbursement {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub amount: i64,
    pub bank_code: String,
    pub account_number: String,
    pub account_name: String,
    pub account_type: paylane_types::AccountType,
}

/// Merchant repository trait
#[async_trait]
pub trait MerchantRepository: Send + Sync {
    /// Find a merchant by ID
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<Merchant>>;
}

/// Entitlement repository trait
#[async_trait]
pub trait EntitlementRepository: Send + Sync {
    /// Replace the capability set granted by a subscription
    async fn replace_for_subscription(
        &self,
        subscription_id: Uuid,
        capabilities: &[Capability],
    ) -> DbResult<()>;

    /// List the capabilities granted by a subscription
    async fn list_for_subscription(&self, subscription_id: Uuid) -> DbResult<Vec<Capability>>;
}

/// Short-lived ledger of webhook deliveries, for audit and duplicate
/// accounting. Correctness never depends on it; the conditional
/// transitions carry the idempotency guarantee.
#[async_trait]
pub trait EventLedger: Send + Sync {
    /// Record a delivery; returns `true` when this fingerprint is first-seen
    async fn record(
        &self,
        provider: Provider,
        fingerprint: &str,
        event_type: &str,
    ) -> DbResult<bool>;
}
