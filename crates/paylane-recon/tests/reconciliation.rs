//! End-to-end reconciliation tests
//!
//! Drive the orchestrator through the in-memory store with mock provider
//! clients: duplicate deliveries, entry-point races, out-of-order
//! terminal events, payout failures and the subscription lifecycle.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use paylane_db::{
    DisbursementRepository, EntitlementRepository, MemoryRepositories, PaymentRepository,
    SubscriptionRepository,
};
use paylane_recon::{
    normalize, BankApi, CallbackOutcome, CardApi, DisbursementReceipt, DisbursementRequest,
    ProviderPaymentStatus, ReconConfig, ReconError, ReconOutcome, Reconciler, Stores,
};
use paylane_types::{
    AccountType, BankDetails, DisbursementStatus, Merchant, PaymentStatus, PlanKind, Provider,
    SubscriptionStatus,
};

/// Bank provider double: configurable status probe, payout call counting
struct MockBankApi {
    status: Mutex<Result<ProviderPaymentStatus, String>>,
    payout_calls: AtomicU32,
    fail_payouts: AtomicBool,
}

impl MockBankApi {
    fn new() -> Self {
        Self {
            status: Mutex::new(Ok(ProviderPaymentStatus::Completed)),
            payout_calls: AtomicU32::new(0),
            fail_payouts: AtomicBool::new(false),
        }
    }

    fn set_status(&self, status: Result<ProviderPaymentStatus, &str>) {
        *self.status.lock().unwrap() = status.map_err(String::from);
    }

    fn payout_calls(&self) -> u32 {
        self.payout_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BankApi for MockBankApi {
    async fn payment_status(&self, _ref: &str) -> Result<ProviderPaymentStatus, ReconError> {
        self.status
            .lock()
            .unwrap()
            .clone()
            .map_err(ReconError::ProviderVerification)
    }

    async fn create_disbursement(
        &self,
        request: DisbursementRequest,
    ) -> Result<DisbursementReceipt, ReconError> {
        self.payout_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_payouts.load(Ordering::SeqCst) {
            return Err(ReconError::SideEffect("provider unavailable".into()));
        }
        Ok(DisbursementReceipt {
            provider_ref: format!("disb_{}", request.idempotency_ref),
            status: DisbursementStatus::Submitted,
        })
    }
}

/// Card provider double
struct MockCardApi {
    status: Mutex<Result<ProviderPaymentStatus, String>>,
}

impl MockCardApi {
    fn new() -> Self {
        Self {
            status: Mutex::new(Ok(ProviderPaymentStatus::Completed)),
        }
    }
}

#[async_trait]
impl CardApi for MockCardApi {
    async fn verify_transaction(&self, _ref: &str) -> Result<ProviderPaymentStatus, ReconError> {
        self.status
            .lock()
            .unwrap()
            .clone()
            .map_err(ReconError::ProviderVerification)
    }
}

struct Harness {
    recon: Arc<Reconciler>,
    repos: MemoryRepositories,
    bank: Arc<MockBankApi>,
    card: Arc<MockCardApi>,
}

fn harness() -> Harness {
    harness_with_commission(500)
}

fn harness_with_commission(commission_bps: u16) -> Harness {
    let repos = MemoryRepositories::new();
    let bank = Arc::new(MockBankApi::new());
    let card = Arc::new(MockCardApi::new());
    let recon = Arc::new(Reconciler::new(
        Stores::memory(&repos),
        card.clone(),
        bank.clone(),
        ReconConfig::new(commission_bps),
    ));
    Harness {
        recon,
        repos,
        bank,
        card,
    }
}

async fn seed_merchant(h: &Harness) -> Uuid {
    let id = Uuid::new_v4();
    h.repos
        .merchants
        .insert(Merchant {
            id,
            business_name: "Mzansi Goods".into(),
            bank: Some(BankDetails {
                bank_code: "250655".into(),
                account_number: "62000000001".into(),
                account_name: "Mzansi Goods (Pty) Ltd".into(),
                account_type: AccountType::Current,
                verified: true,
            }),
        })
        .await;
    id
}

fn stitch_completed(reference: &str) -> Vec<u8> {
    format!(
        r#"{{"eventType":"PaymentInitiationRequestCompleted","resource":{{"id":"{reference}"}}}}"#
    )
    .into_bytes()
}

fn stitch_cancelled(reference: &str) -> Vec<u8> {
    format!(
        r#"{{"eventType":"PaymentInitiationRequestCancelled","resource":{{"id":"{reference}"}}}}"#
    )
    .into_bytes()
}

fn paystack_charge_success(reference: &str) -> Vec<u8> {
    format!(
        r#"{{"event":"charge.success","data":{{"reference":"{reference}","gateway_response":"Successful"}}}}"#
    )
    .into_bytes()
}

#[tokio::test]
async fn commission_split_is_fixed_at_creation() {
    let h = harness();
    let merchant_id = seed_merchant(&h).await;

    let payment = h
        .recon
        .register_payment(Provider::Stitch, "pay_123", 10_000, "order-1", merchant_id)
        .await
        .unwrap();

    assert_eq!(payment.fee_amount, 500);
    assert_eq!(payment.merchant_amount, 9_500);
    assert_eq!(payment.amount, payment.fee_amount + payment.merchant_amount);
    assert_eq!(payment.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn completed_webhook_settles_and_pays_out() {
    let h = harness();
    let merchant_id = seed_merchant(&h).await;
    h.recon
        .register_payment(Provider::Stitch, "pay_123", 10_000, "order-1", merchant_id)
        .await
        .unwrap();

    let event = normalize(Provider::Stitch, &stitch_completed("pay_123")).unwrap();
    let outcome = h.recon.process_webhook(event).await.unwrap();
    assert_eq!(outcome, ReconOutcome::Applied);

    let payment = h
        .repos
        .payments
        .find_by_provider_ref("pay_123")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert!(payment.completed_at.is_some());
    assert_eq!(payment.amount, payment.fee_amount + payment.merchant_amount);

    let disbursement = h
        .repos
        .disbursements
        .find_by_payment_id(payment.id)
        .await
        .unwrap()
        .expect("disbursement created");
    assert_eq!(disbursement.amount, 9_500);
    assert_eq!(disbursement.status, DisbursementStatus::Submitted);
    assert!(disbursement.provider_ref.is_some());
    assert_eq!(payment.disbursement_id, Some(disbursement.id));
}

#[tokio::test]
async fn duplicate_deliveries_disburse_once() {
    let h = harness();
    let merchant_id = seed_merchant(&h).await;
    h.recon
        .register_payment(Provider::Stitch, "pay_123", 10_000, "order-1", merchant_id)
        .await
        .unwrap();

    let body = stitch_completed("pay_123");
    let first = h
        .recon
        .process_webhook(normalize(Provider::Stitch, &body).unwrap())
        .await
        .unwrap();
    assert_eq!(first, ReconOutcome::Applied);

    for _ in 0..4 {
        let outcome = h
            .recon
            .process_webhook(normalize(Provider::Stitch, &body).unwrap())
            .await
            .unwrap();
        assert_eq!(outcome, ReconOutcome::Stale);
    }

    assert_eq!(h.bank.payout_calls(), 1);
}

#[tokio::test]
async fn cancellation_after_completion_is_stale() {
    let h = harness();
    let merchant_id = seed_merchant(&h).await;
    h.recon
        .register_payment(Provider::Stitch, "pay_123", 10_000, "order-1", merchant_id)
        .await
        .unwrap();

    h.recon
        .process_webhook(normalize(Provider::Stitch, &stitch_completed("pay_123")).unwrap())
        .await
        .unwrap();
    let outcome = h
        .recon
        .process_webhook(normalize(Provider::Stitch, &stitch_cancelled("pay_123")).unwrap())
        .await
        .unwrap();

    assert_eq!(outcome, ReconOutcome::Stale);
    let payment = h
        .repos
        .payments
        .find_by_provider_ref("pay_123")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
}

#[tokio::test]
async fn racing_webhook_and_callback_disburse_once() {
    let h = harness();
    let merchant_id = seed_merchant(&h).await;
    h.recon
        .register_payment(Provider::Stitch, "pay_race", 10_000, "order-1", merchant_id)
        .await
        .unwrap();

    let webhook_recon = h.recon.clone();
    let webhook = tokio::spawn(async move {
        let event = normalize(Provider::Stitch, &stitch_completed("pay_race")).unwrap();
        webhook_recon.process_webhook(event).await
    });
    let callback_recon = h.recon.clone();
    let callback = tokio::spawn(async move {
        callback_recon
            .reconcile_callback(Provider::Stitch, "pay_race")
            .await
    });

    let webhook_outcome = webhook.await.unwrap().unwrap();
    let callback_outcome = callback.await.unwrap();

    // Both entry points report a settled payment, exactly one of them won
    // the transition, and only the winner disbursed.
    assert!(matches!(
        webhook_outcome,
        ReconOutcome::Applied | ReconOutcome::Stale
    ));
    assert_eq!(callback_outcome, CallbackOutcome::Success);
    assert_eq!(h.bank.payout_calls(), 1);

    let payment = h
        .repos
        .payments
        .find_by_provider_ref("pay_race")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert!(h
        .repos
        .disbursements
        .find_by_payment_id(payment.id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn card_callback_verifies_before_settling() {
    let h = harness();
    let merchant_id = seed_merchant(&h).await;
    h.recon
        .register_payment(Provider::Paystack, "ps_ref_1", 10_000, "order-1", merchant_id)
        .await
        .unwrap();

    let outcome = h
        .recon
        .reconcile_callback(Provider::Paystack, "ps_ref_1")
        .await;
    assert_eq!(outcome, CallbackOutcome::Success);
    assert_eq!(h.bank.payout_calls(), 1);

    // A second arrival of the same callback is harmless.
    let outcome = h
        .recon
        .reconcile_callback(Provider::Paystack, "ps_ref_1")
        .await;
    assert_eq!(outcome, CallbackOutcome::Success);
    assert_eq!(h.bank.payout_calls(), 1);

    // And a callback whose verification disagrees with the stored state
    // cannot regress the payment.
    *h.card.status.lock().unwrap() = Ok(ProviderPaymentStatus::Failed);
    let outcome = h
        .recon
        .reconcile_callback(Provider::Paystack, "ps_ref_1")
        .await;
    assert_eq!(outcome, CallbackOutcome::Success);
}

#[tokio::test]
async fn callback_verification_failure_leaves_payment_pending() {
    let h = harness();
    let merchant_id = seed_merchant(&h).await;
    h.recon
        .register_payment(Provider::Stitch, "pay_123", 10_000, "order-1", merchant_id)
        .await
        .unwrap();

    h.bank.set_status(Err("timed out"));
    let outcome = h.recon.reconcile_callback(Provider::Stitch, "pay_123").await;

    assert_eq!(outcome, CallbackOutcome::Error);
    let payment = h
        .repos
        .payments
        .find_by_provider_ref("pay_123")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(h.bank.payout_calls(), 0);
}

#[tokio::test]
async fn callback_with_inflight_payment_reports_pending() {
    let h = harness();
    let merchant_id = seed_merchant(&h).await;
    h.recon
        .register_payment(Provider::Stitch, "pay_123", 10_000, "order-1", merchant_id)
        .await
        .unwrap();

    h.bank.set_status(Ok(ProviderPaymentStatus::Pending));
    let outcome = h.recon.reconcile_callback(Provider::Stitch, "pay_123").await;

    assert_eq!(outcome, CallbackOutcome::Pending);
    let payment = h
        .repos
        .payments
        .find_by_provider_ref("pay_123")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn callback_with_failed_payment_reports_failed() {
    let h = harness();
    let merchant_id = seed_merchant(&h).await;
    h.recon
        .register_payment(Provider::Stitch, "pay_123", 10_000, "order-1", merchant_id)
        .await
        .unwrap();

    h.bank.set_status(Ok(ProviderPaymentStatus::Failed));
    let outcome = h.recon.reconcile_callback(Provider::Stitch, "pay_123").await;

    assert_eq!(outcome, CallbackOutcome::Failed);
    let payment = h
        .repos
        .payments
        .find_by_provider_ref("pay_123")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert_eq!(h.bank.payout_calls(), 0);
}

#[tokio::test]
async fn payout_failure_keeps_payment_completed() {
    let h = harness();
    let merchant_id = seed_merchant(&h).await;
    h.recon
        .register_payment(Provider::Stitch, "pay_123", 10_000, "order-1", merchant_id)
        .await
        .unwrap();

    h.bank.fail_payouts.store(true, Ordering::SeqCst);
    let outcome = h
        .recon
        .process_webhook(normalize(Provider::Stitch, &stitch_completed("pay_123")).unwrap())
        .await
        .unwrap();

    // The delivery is acknowledged: the charge stands even though the
    // payout plumbing failed.
    assert_eq!(outcome, ReconOutcome::Applied);

    let payment = h
        .repos
        .payments
        .find_by_provider_ref("pay_123")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);

    let disbursement = h
        .repos
        .disbursements
        .find_by_payment_id(payment.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(disbursement.status, DisbursementStatus::Error);
    assert!(disbursement.failure_reason.is_some());
}

#[tokio::test]
async fn merchant_without_bank_details_skips_payout() {
    let h = harness();
    let merchant_id = Uuid::new_v4();
    h.repos
        .merchants
        .insert(Merchant {
            id: merchant_id,
            business_name: "No Bank Yet".into(),
            bank: None,
        })
        .await;
    h.recon
        .register_payment(Provider::Stitch, "pay_123", 10_000, "order-1", merchant_id)
        .await
        .unwrap();

    let outcome = h
        .recon
        .process_webhook(normalize(Provider::Stitch, &stitch_completed("pay_123")).unwrap())
        .await
        .unwrap();

    assert_eq!(outcome, ReconOutcome::Applied);
    assert_eq!(h.bank.payout_calls(), 0);

    let payment = h
        .repos
        .payments
        .find_by_provider_ref("pay_123")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert!(payment.disbursement_id.is_none());
}

#[tokio::test]
async fn full_commission_payment_has_no_payout() {
    let h = harness_with_commission(10_000);
    let merchant_id = seed_merchant(&h).await;
    h.recon
        .register_payment(Provider::Stitch, "pay_123", 10_000, "order-1", merchant_id)
        .await
        .unwrap();

    let outcome = h
        .recon
        .process_webhook(normalize(Provider::Stitch, &stitch_completed("pay_123")).unwrap())
        .await
        .unwrap();

    assert_eq!(outcome, ReconOutcome::Applied);
    assert_eq!(h.bank.payout_calls(), 0);
}

#[tokio::test]
async fn charge_success_activates_subscription_checkout() {
    let h = harness();
    let user_id = Uuid::new_v4();
    let sub = h
        .recon
        .register_subscription(user_id, PlanKind::Bundle, "ps_sub_1")
        .await
        .unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Trialing);

    let outcome = h
        .recon
        .process_webhook(normalize(Provider::Paystack, &paystack_charge_success("ps_sub_1")).unwrap())
        .await
        .unwrap();
    assert_eq!(outcome, ReconOutcome::Applied);

    let sub = h
        .repos
        .subscriptions
        .find_by_reference("ps_sub_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Active);
    assert!(sub.started_at.is_some());

    let caps = h
        .repos
        .entitlements
        .list_for_subscription(sub.id)
        .await
        .unwrap();
    assert_eq!(caps, PlanKind::Bundle.capabilities().to_vec());
}

#[tokio::test]
async fn subscription_create_stores_the_billing_code() {
    let h = harness();
    h.recon
        .register_subscription(Uuid::new_v4(), PlanKind::Bundle, "ps_sub_1")
        .await
        .unwrap();

    let body = br#"{"event":"subscription.create","data":{"subscription_code":"SUB_42","reference":"ps_sub_1"}}"#;
    let outcome = h
        .recon
        .process_webhook(normalize(Provider::Paystack, body).unwrap())
        .await
        .unwrap();
    assert_eq!(outcome, ReconOutcome::Applied);

    let sub = h
        .repos
        .subscriptions
        .find_by_reference("ps_sub_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sub.subscription_code.as_deref(), Some("SUB_42"));
    assert_eq!(sub.status, SubscriptionStatus::Active);
}

#[tokio::test]
async fn not_renew_cancels_with_period_end_expiry() {
    let h = harness();
    h.recon
        .register_subscription(Uuid::new_v4(), PlanKind::Bundle, "ps_sub_1")
        .await
        .unwrap();
    h.recon
        .process_webhook(normalize(Provider::Paystack, &paystack_charge_success("ps_sub_1")).unwrap())
        .await
        .unwrap();
    h.repos
        .subscriptions
        .set_subscription_code("ps_sub_1", "SUB_42")
        .await
        .unwrap();

    let body = br#"{"event":"subscription.not_renew","data":{"subscription_code":"SUB_42"}}"#;
    let outcome = h
        .recon
        .process_webhook(normalize(Provider::Paystack, body).unwrap())
        .await
        .unwrap();
    assert_eq!(outcome, ReconOutcome::Applied);

    let sub = h
        .repos
        .subscriptions
        .find_by_reference("ps_sub_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Cancelled);

    let expires_at = sub.expires_at.expect("expiry set on cancellation");
    let expected = Utc::now() + Duration::days(30);
    assert!((expires_at - expected).num_minutes().abs() < 5);

    // Access survives until the period ends; the capability set stays.
    assert!(sub.is_entitled(Utc::now()));
    assert!(!sub.is_entitled(Utc::now() + Duration::days(31)));
    let caps = h
        .repos
        .entitlements
        .list_for_subscription(sub.id)
        .await
        .unwrap();
    assert_eq!(caps, PlanKind::Bundle.capabilities().to_vec());
}

#[tokio::test]
async fn invoice_payment_failed_moves_active_to_past_due() {
    let h = harness();
    h.recon
        .register_subscription(Uuid::new_v4(), PlanKind::Bundle, "ps_sub_1")
        .await
        .unwrap();
    h.recon
        .process_webhook(normalize(Provider::Paystack, &paystack_charge_success("ps_sub_1")).unwrap())
        .await
        .unwrap();
    h.repos
        .subscriptions
        .set_subscription_code("ps_sub_1", "SUB_42")
        .await
        .unwrap();

    let body =
        br#"{"event":"invoice.payment_failed","data":{"subscription":{"subscription_code":"SUB_42"}}}"#;
    let outcome = h
        .recon
        .process_webhook(normalize(Provider::Paystack, body).unwrap())
        .await
        .unwrap();
    assert_eq!(outcome, ReconOutcome::Applied);

    let sub = h
        .repos
        .subscriptions
        .find_by_reference("ps_sub_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sub.status, SubscriptionStatus::PastDue);

    // Repeated failures end in cancellation.
    let body = br#"{"event":"subscription.disable","data":{"subscription_code":"SUB_42"}}"#;
    h.recon
        .process_webhook(normalize(Provider::Paystack, body).unwrap())
        .await
        .unwrap();
    let sub = h
        .repos
        .subscriptions
        .find_by_reference("ps_sub_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Cancelled);
}

#[tokio::test]
async fn disbursement_webhooks_follow_the_transition_table() {
    let h = harness();
    let merchant_id = seed_merchant(&h).await;
    h.recon
        .register_payment(Provider::Stitch, "pay_123", 10_000, "order-1", merchant_id)
        .await
        .unwrap();
    h.recon
        .process_webhook(normalize(Provider::Stitch, &stitch_completed("pay_123")).unwrap())
        .await
        .unwrap();

    let payment = h
        .repos
        .payments
        .find_by_provider_ref("pay_123")
        .await
        .unwrap()
        .unwrap();
    let disbursement = h
        .repos
        .disbursements
        .find_by_payment_id(payment.id)
        .await
        .unwrap()
        .unwrap();
    let provider_ref = disbursement.provider_ref.clone().unwrap();

    // submitted -> paused -> completed is legal
    let pause = format!(
        r#"{{"eventType":"DisbursementPaused","resource":{{"id":"{provider_ref}"}}}}"#
    );
    let outcome = h
        .recon
        .process_webhook(normalize(Provider::Stitch, pause.as_bytes()).unwrap())
        .await
        .unwrap();
    assert_eq!(outcome, ReconOutcome::Applied);

    let complete = format!(
        r#"{{"eventType":"DisbursementCompleted","resource":{{"id":"{provider_ref}"}}}}"#
    );
    let outcome = h
        .recon
        .process_webhook(normalize(Provider::Stitch, complete.as_bytes()).unwrap())
        .await
        .unwrap();
    assert_eq!(outcome, ReconOutcome::Applied);

    // completed is terminal; a late reversal event must not regress it
    let reverse = format!(
        r#"{{"eventType":"DisbursementReversed","resource":{{"id":"{provider_ref}","failureReason":"recalled"}}}}"#
    );
    let outcome = h
        .recon
        .process_webhook(normalize(Provider::Stitch, reverse.as_bytes()).unwrap())
        .await
        .unwrap();
    assert_eq!(outcome, ReconOutcome::Stale);

    let disbursement = h
        .repos
        .disbursements
        .find_by_payment_id(payment.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(disbursement.status, DisbursementStatus::Completed);
}

#[tokio::test]
async fn unknown_events_and_references_are_acknowledged_noops() {
    let h = harness();

    let unknown_type = br#"{"eventType":"AccountLinked","resource":{"id":"whatever"}}"#;
    let outcome = h
        .recon
        .process_webhook(normalize(Provider::Stitch, unknown_type).unwrap())
        .await
        .unwrap();
    assert_eq!(outcome, ReconOutcome::NoOp);

    let unknown_ref = stitch_completed("no_such_payment");
    let outcome = h
        .recon
        .process_webhook(normalize(Provider::Stitch, &unknown_ref).unwrap())
        .await
        .unwrap();
    assert_eq!(outcome, ReconOutcome::NoOp);
}

#[tokio::test]
async fn expiry_sweep_expires_lapsed_active_subscriptions() {
    let h = harness();
    h.recon
        .register_subscription(Uuid::new_v4(), PlanKind::Bundle, "ps_sub_1")
        .await
        .unwrap();
    h.recon
        .process_webhook(normalize(Provider::Paystack, &paystack_charge_success("ps_sub_1")).unwrap())
        .await
        .unwrap();

    // Force the paid period into the past, then sweep.
    h.repos
        .subscriptions
        .transition(
            "ps_sub_1",
            &[SubscriptionStatus::Active],
            SubscriptionStatus::Active,
            Some(Utc::now() - Duration::days(1)),
        )
        .await
        .unwrap();

    let expired = h.recon.expire_due_subscriptions().await.unwrap();
    assert_eq!(expired, 1);

    let sub = h
        .repos
        .subscriptions
        .find_by_reference("ps_sub_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Expired);
    assert!(!sub.is_entitled(Utc::now()));
}
