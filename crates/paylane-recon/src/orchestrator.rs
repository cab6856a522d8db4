//! Reconciliation orchestrator
//!
//! The one place where transition legality lives. Both entry points, the
//! push webhook and the redirect callback, land here, and every mutation
//! goes through the store's conditional transitions, so duplicate
//! deliveries, races between entry points and out-of-order terminal
//! events all degrade to acknowledged no-ops.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use paylane_db::{
    CreatePayment, CreateSubscription, DbError, DisbursementRepository, EntitlementRepository,
    EventLedger, MerchantRepository, PaymentRepository, SubscriptionRepository,
};
use paylane_types::{
    DisbursementStatus, Payment, PaymentStatus, PlanKind, Provider, Subscription,
    SubscriptionStatus,
};

use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::fees;
use crate::normalize::{EventKind, WebhookEvent};
use crate::payout::DisbursementInitiator;
use crate::providers::{BankApi, CardApi, ProviderPaymentStatus};

/// What processing a webhook event did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconOutcome {
    /// The transition was applied by this delivery
    Applied,
    /// The store rejected the transition; the event was already handled
    /// or arrived after a terminal state
    Stale,
    /// Recognized delivery with nothing to change
    NoOp,
}

impl ReconOutcome {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Stale => "stale",
            Self::NoOp => "noop",
        }
    }
}

/// Coarse outcome reported to the user-facing redirect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Payment verified and completed
    Success,
    /// Payment verified as failed or cancelled
    Failed,
    /// Provider still reports the payment in flight
    Pending,
    /// Verification or storage failed; the payment stays pending
    Error,
}

impl CallbackOutcome {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Pending => "pending",
            Self::Error => "error",
        }
    }
}

/// The engine's storage dependencies, behind trait objects so tests can
/// run the whole orchestrator against the in-memory store
#[derive(Clone)]
pub struct Stores {
    pub payments: Arc<dyn PaymentRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub disbursements: Arc<dyn DisbursementRepository>,
    pub merchants: Arc<dyn MerchantRepository>,
    pub entitlements: Arc<dyn EntitlementRepository>,
    pub ledger: Arc<dyn EventLedger>,
}

impl Stores {
    /// Wire up the Postgres repositories
    pub fn postgres(repos: &paylane_db::Repositories) -> Self {
        Self {
            payments: Arc::new(repos.payments.clone()),
            subscriptions: Arc::new(repos.subscriptions.clone()),
            disbursements: Arc::new(repos.disbursements.clone()),
            merchants: Arc::new(repos.merchants.clone()),
            entitlements: Arc::new(repos.entitlements.clone()),
            ledger: Arc::new(repos.ledger.clone()),
        }
    }

    /// Wire up the in-memory repositories (tests)
    pub fn memory(repos: &paylane_db::MemoryRepositories) -> Self {
        Self {
            payments: repos.payments.clone(),
            subscriptions: repos.subscriptions.clone(),
            disbursements: repos.disbursements.clone(),
            merchants: repos.merchants.clone(),
            entitlements: repos.entitlements.clone(),
            ledger: repos.ledger.clone(),
        }
    }
}

/// Drives the payment, subscription and disbursement state machines
pub struct Reconciler {
    stores: Stores,
    card: Arc<dyn CardApi>,
    bank: Arc<dyn BankApi>,
    payouts: DisbursementInitiator,
    config: ReconConfig,
}

impl Reconciler {
    /// Create a new reconciler
    pub fn new(
        stores: Stores,
        card: Arc<dyn CardApi>,
        bank: Arc<dyn BankApi>,
        config: ReconConfig,
    ) -> Self {
        let payouts = DisbursementInitiator::new(
            bank.clone(),
            stores.payments.clone(),
            stores.disbursements.clone(),
        );
        Self {
            stores,
            card,
            bank,
            payouts,
            config,
        }
    }

    /// Record a pending payment at initiation time.
    ///
    /// This is where the commission split is fixed; nothing downstream
    /// recomputes it.
    pub async fn register_payment(
        &self,
        provider: Provider,
        provider_ref: &str,
        amount: i64,
        order_ref: &str,
        merchant_id: Uuid,
    ) -> Result<Payment, ReconError> {
        let split = fees::split(amount, self.config.commission_bps);
        let payment = self
            .stores
            .payments
            .create(CreatePayment {
                id: Uuid::new_v4(),
                provider_ref: provider_ref.to_string(),
                provider,
                amount,
                fee_amount: split.fee,
                merchant_amount: split.merchant,
                order_ref: order_ref.to_string(),
                merchant_id,
            })
            .await?;
        info!(provider_ref, amount, fee = split.fee, "payment registered");
        Ok(payment)
    }

    /// Record a trialing subscription at checkout time
    pub async fn register_subscription(
        &self,
        user_id: Uuid,
        plan: PlanKind,
        reference: &str,
    ) -> Result<Subscription, ReconError> {
        let subscription = self
            .stores
            .subscriptions
            .create(CreateSubscription {
                id: Uuid::new_v4(),
                user_id,
                plan,
                reference: reference.to_string(),
            })
            .await?;
        info!(reference, %plan, "subscription registered");
        Ok(subscription)
    }

    /// Apply a verified, normalized webhook event.
    ///
    /// Push webhooks passed signature verification, so the event is
    /// trusted as-is; no provider round-trip happens here.
    #[instrument(skip(self, event), fields(provider = %event.provider, event_type = %event.event_type))]
    pub async fn process_webhook(&self, event: WebhookEvent) -> Result<ReconOutcome, ReconError> {
        let first_seen = self
            .stores
            .ledger
            .record(event.provider, &event.fingerprint, &event.event_type)
            .await?;
        if !first_seen {
            // Redelivery. The conditional transitions below make it a
            // no-op on their own; the ledger only feeds the audit trail.
            metrics::counter!("recon_webhook_duplicates_total", "provider" => event.provider.as_str())
                .increment(1);
            debug!(reference = %event.reference, "duplicate webhook delivery");
        }

        match &event.kind {
            EventKind::ChargeSucceeded => self.settle_charge(&event).await,
            EventKind::PaymentCompleted => {
                self.complete_payment(&event.reference, event.reason.as_deref())
                    .await
            }
            EventKind::PaymentFailed => {
                self.close_payment(
                    &event.reference,
                    PaymentStatus::Failed,
                    event.reason.as_deref(),
                )
                .await
            }
            EventKind::PaymentCancelled => {
                self.close_payment(
                    &event.reference,
                    PaymentStatus::Cancelled,
                    event.reason.as_deref(),
                )
                .await
            }
            EventKind::SubscriptionStarted { subscription_code } => {
                self.start_subscription(&event.reference, subscription_code)
                    .await
            }
            EventKind::SubscriptionCancelled => self.cancel_subscription(&event.reference).await,
            EventKind::SubscriptionPastDue => {
                self.subscription_past_due(&event.reference).await
            }
            EventKind::DisbursementCompleted => {
                self.disbursement_event(&event, DisbursementStatus::Completed)
                    .await
            }
            EventKind::DisbursementError => {
                self.disbursement_event(&event, DisbursementStatus::Error)
                    .await
            }
            EventKind::DisbursementPaused => {
                self.disbursement_event(&event, DisbursementStatus::Paused)
                    .await
            }
            EventKind::DisbursementCancelled => {
                self.disbursement_event(&event, DisbursementStatus::Cancelled)
                    .await
            }
            EventKind::DisbursementReversed => {
                self.disbursement_event(&event, DisbursementStatus::Reversed)
                    .await
            }
            EventKind::Ignored => {
                debug!(event_type = %event.event_type, "ignoring unhandled event type");
                Ok(ReconOutcome::NoOp)
            }
        }
    }

    /// Reconcile a redirect callback.
    ///
    /// Callback query parameters are attacker-observable and unsigned, so
    /// the claimed outcome is never trusted: the provider's own API is
    /// asked first, and on verification failure the payment stays pending
    /// for the webhook path to finish.
    #[instrument(skip(self))]
    pub async fn reconcile_callback(
        &self,
        provider: Provider,
        provider_ref: &str,
    ) -> CallbackOutcome {
        let verified = match provider {
            Provider::Paystack => self.card.verify_transaction(provider_ref).await,
            Provider::Stitch => self.bank.payment_status(provider_ref).await,
        };

        let status = match verified {
            Ok(status) => status,
            Err(e) => {
                warn!(provider_ref, error = %e, "callback verification failed; payment left pending");
                return CallbackOutcome::Error;
            }
        };

        let applied = match status {
            ProviderPaymentStatus::Completed => {
                self.complete_payment(provider_ref, None).await
            }
            ProviderPaymentStatus::Failed => {
                self.close_payment(
                    provider_ref,
                    PaymentStatus::Failed,
                    Some("provider reported failure"),
                )
                .await
            }
            ProviderPaymentStatus::Cancelled => {
                self.close_payment(
                    provider_ref,
                    PaymentStatus::Cancelled,
                    Some("provider reported cancellation"),
                )
                .await
            }
            ProviderPaymentStatus::Pending => return CallbackOutcome::Pending,
        };

        if let Err(e) = applied {
            error!(provider_ref, error = %e, "callback reconciliation failed");
            return CallbackOutcome::Error;
        }

        // Report whatever the record holds now; under a race the webhook
        // path may have won, which is still a settled payment.
        match self.stores.payments.find_by_provider_ref(provider_ref).await {
            Ok(Some(payment)) => match payment.status {
                PaymentStatus::Completed => CallbackOutcome::Success,
                PaymentStatus::Failed | PaymentStatus::Cancelled => CallbackOutcome::Failed,
                PaymentStatus::Pending => CallbackOutcome::Pending,
            },
            Ok(None) => CallbackOutcome::Error,
            Err(e) => {
                error!(provider_ref, error = %e, "failed to read payment after callback");
                CallbackOutcome::Error
            }
        }
    }

    /// Move expired-but-active subscriptions to `expired`
    pub async fn expire_due_subscriptions(&self) -> Result<u64, ReconError> {
        let expired = self.stores.subscriptions.expire_overdue(Utc::now()).await?;
        if expired > 0 {
            info!(expired, "subscriptions expired");
        }
        Ok(expired)
    }

    /// A card charge settled. The reference belongs either to a customer
    /// payment or to a subscription checkout; resolve in that order.
    async fn settle_charge(&self, event: &WebhookEvent) -> Result<ReconOutcome, ReconError> {
        if self
            .stores
            .payments
            .find_by_provider_ref(&event.reference)
            .await?
            .is_some()
        {
            return self
                .complete_payment(&event.reference, event.reason.as_deref())
                .await;
        }

        if self
            .stores
            .subscriptions
            .find_by_reference(&event.reference)
            .await?
            .is_some()
        {
            return self.activate_subscription(&event.reference).await;
        }

        warn!(reference = %event.reference, "charge for unknown reference");
        Ok(ReconOutcome::NoOp)
    }

    async fn complete_payment(
        &self,
        provider_ref: &str,
        reason: Option<&str>,
    ) -> Result<ReconOutcome, ReconError> {
        let transition = match self
            .stores
            .payments
            .transition(
                provider_ref,
                &[PaymentStatus::Pending],
                PaymentStatus::Completed,
                reason,
            )
            .await
        {
            Ok(t) => t,
            Err(DbError::NotFound) => {
                warn!(provider_ref, "completion event for unknown payment");
                return Ok(ReconOutcome::NoOp);
            }
            Err(e) => return Err(e.into()),
        };

        if !transition.applied {
            debug!(provider_ref, status = %transition.status, "payment already settled");
            metrics::counter!("recon_stale_transitions_total", "entity" => "payment").increment(1);
            return Ok(ReconOutcome::Stale);
        }

        info!(provider_ref, "payment completed");
        self.run_payout(provider_ref).await?;
        Ok(ReconOutcome::Applied)
    }

    /// Runs on the winning side of the completion transition only. Payout
    /// failures are alerts, not errors: the customer's charge stands.
    async fn run_payout(&self, provider_ref: &str) -> Result<(), ReconError> {
        let payment = self
            .stores
            .payments
            .find_by_provider_ref(provider_ref)
            .await?
            .ok_or(DbError::NotFound)?;

        if payment.merchant_amount <= 0 {
            debug!(provider_ref, "nothing to disburse");
            return Ok(());
        }

        let merchant = self
            .stores
            .merchants
            .find_by_id(payment.merchant_id)
            .await?
            .ok_or(DbError::NotFound)?;

        if merchant.payout_bank().is_none() {
            warn!(
                merchant_id = %merchant.id,
                payment_id = %payment.id,
                "payout skipped: merchant has no verified bank details"
            );
            return Ok(());
        }

        if let Err(e) = self.payouts.initiate(&payment, &merchant).await {
            error!(
                payment_id = %payment.id,
                error = %e,
                "disbursement initiation failed; payment remains completed"
            );
        }
        Ok(())
    }

    async fn close_payment(
        &self,
        provider_ref: &str,
        to: PaymentStatus,
        reason: Option<&str>,
    ) -> Result<ReconOutcome, ReconError> {
        let transition = match self
            .stores
            .payments
            .transition(provider_ref, &[PaymentStatus::Pending], to, reason)
            .await
        {
            Ok(t) => t,
            Err(DbError::NotFound) => {
                warn!(provider_ref, %to, "terminal event for unknown payment");
                return Ok(ReconOutcome::NoOp);
            }
            Err(e) => return Err(e.into()),
        };

        if !transition.applied {
            debug!(provider_ref, status = %transition.status, "stale terminal event");
            metrics::counter!("recon_stale_transitions_total", "entity" => "payment").increment(1);
            return Ok(ReconOutcome::Stale);
        }

        info!(provider_ref, %to, "payment closed");
        Ok(ReconOutcome::Applied)
    }

    async fn activate_subscription(&self, reference: &str) -> Result<ReconOutcome, ReconError> {
        let transition = match self
            .stores
            .subscriptions
            .transition(
                reference,
                &[SubscriptionStatus::Trialing],
                SubscriptionStatus::Active,
                None,
            )
            .await
        {
            Ok(t) => t,
            Err(DbError::NotFound) => {
                warn!(reference, "activation for unknown subscription");
                return Ok(ReconOutcome::NoOp);
            }
            Err(e) => return Err(e.into()),
        };

        if !transition.applied {
            debug!(reference, status = %transition.status, "subscription already active");
            metrics::counter!("recon_stale_transitions_total", "entity" => "subscription")
                .increment(1);
            return Ok(ReconOutcome::Stale);
        }

        let subscription = self
            .stores
            .subscriptions
            .find_by_reference(reference)
            .await?
            .ok_or(DbError::NotFound)?;
        self.stores
            .entitlements
            .replace_for_subscription(subscription.id, subscription.plan.capabilities())
            .await?;

        info!(reference, plan = %subscription.plan, "subscription activated");
        Ok(ReconOutcome::Applied)
    }

    async fn start_subscription(
        &self,
        reference: &str,
        subscription_code: &str,
    ) -> Result<ReconOutcome, ReconError> {
        if self
            .stores
            .subscriptions
            .find_by_reference(reference)
            .await?
            .is_none()
        {
            warn!(reference, "billing code for unknown subscription");
            return Ok(ReconOutcome::NoOp);
        }

        self.stores
            .subscriptions
            .set_subscription_code(reference, subscription_code)
            .await?;

        // The checkout charge may have activated it already; either way
        // the code is now stored for later lifecycle events.
        self.activate_subscription(reference).await
    }

    async fn cancel_subscription(&self, key: &str) -> Result<ReconOutcome, ReconError> {
        let Some(subscription) = self.find_subscription(key).await? else {
            warn!(key, "cancellation for unknown subscription");
            return Ok(ReconOutcome::NoOp);
        };

        // Access runs to the end of the paid period, not to the moment of
        // cancellation; entitlement checks read expires_at.
        let expires_at = Utc::now() + Duration::days(self.config.billing_period_days);
        let transition = self
            .stores
            .subscriptions
            .transition(
                &subscription.reference,
                &[SubscriptionStatus::Active, SubscriptionStatus::PastDue],
                SubscriptionStatus::Cancelled,
                Some(expires_at),
            )
            .await?;

        if !transition.applied {
            debug!(reference = %subscription.reference, status = %transition.status, "stale cancellation");
            metrics::counter!("recon_stale_transitions_total", "entity" => "subscription")
                .increment(1);
            return Ok(ReconOutcome::Stale);
        }

        info!(reference = %subscription.reference, %expires_at, "subscription cancelled");
        Ok(ReconOutcome::Applied)
    }

    async fn subscription_past_due(&self, key: &str) -> Result<ReconOutcome, ReconError> {
        let Some(subscription) = self.find_subscription(key).await? else {
            warn!(key, "payment failure for unknown subscription");
            return Ok(ReconOutcome::NoOp);
        };

        let transition = self
            .stores
            .subscriptions
            .transition(
                &subscription.reference,
                &[SubscriptionStatus::Active],
                SubscriptionStatus::PastDue,
                None,
            )
            .await?;

        if !transition.applied {
            debug!(reference = %subscription.reference, status = %transition.status, "stale past-due event");
            metrics::counter!("recon_stale_transitions_total", "entity" => "subscription")
                .increment(1);
            return Ok(ReconOutcome::Stale);
        }

        info!(reference = %subscription.reference, "subscription past due");
        Ok(ReconOutcome::Applied)
    }

    /// Billing events carry the recurring code; older ones carry the
    /// checkout reference. Try both.
    async fn find_subscription(&self, key: &str) -> Result<Option<Subscription>, ReconError> {
        if let Some(subscription) = self
            .stores
            .subscriptions
            .find_by_subscription_code(key)
            .await?
        {
            return Ok(Some(subscription));
        }
        Ok(self.stores.subscriptions.find_by_reference(key).await?)
    }

    async fn disbursement_event(
        &self,
        event: &WebhookEvent,
        to: DisbursementStatus,
    ) -> Result<ReconOutcome, ReconError> {
        let from: &[DisbursementStatus] = match to {
            DisbursementStatus::Completed | DisbursementStatus::Cancelled => {
                &[DisbursementStatus::Submitted, DisbursementStatus::Paused]
            }
            DisbursementStatus::Error
            | DisbursementStatus::Paused
            | DisbursementStatus::Reversed => &[DisbursementStatus::Submitted],
            DisbursementStatus::Submitted => {
                debug!(event_type = %event.event_type, "no transition targets submitted");
                return Ok(ReconOutcome::NoOp);
            }
        };

        let transition = match self
            .stores
            .disbursements
            .transition(&event.reference, from, to, event.reason.as_deref())
            .await
        {
            Ok(t) => t,
            Err(DbError::NotFound) => {
                warn!(reference = %event.reference, "event for unknown disbursement");
                return Ok(ReconOutcome::NoOp);
            }
            Err(e) => return Err(e.into()),
        };

        if !transition.applied {
            debug!(reference = %event.reference, status = %transition.status, "stale disbursement event");
            metrics::counter!("recon_stale_transitions_total", "entity" => "disbursement")
                .increment(1);
            return Ok(ReconOutcome::Stale);
        }

        info!(reference = %event.reference, %to, "disbursement updated");
        Ok(ReconOutcome::Applied)
    }
}
