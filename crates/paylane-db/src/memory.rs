//! In-memory repository implementations
//!
//! Backs the repository traits with maps guarded by a write lock, so the
//! conditional transitions stay atomic. Used by the engine's test suites;
//! no production path constructs these.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use paylane_types::{
    Capability, Disbursement, DisbursementStatus, Merchant, Payment, PaymentStatus, Provider,
    Subscription, SubscriptionStatus,
};

use crate::error::{DbError, DbResult};
use crate::repo::{
    CreateDisbursement, CreatePayment, CreateSubscription, DisbursementRepository,
    EntitlementRepository, EventLedger, MerchantRepository, PaymentRepository,
    SubscriptionRepository, Transition,
};

/// In-memory payment repository keyed by provider reference
#[derive(Default)]
pub struct MemoryPaymentRepository {
    rows: RwLock<HashMap<String, Payment>>,
}

#[async_trait]
impl PaymentRepository for MemoryPaymentRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<Payment>> {
        let rows = self.rows.read().await;
        Ok(rows.values().find(|p| p.id == id).cloned())
    }

    async fn find_by_provider_ref(&self, provider_ref: &str) -> DbResult<Option<Payment>> {
        let rows = self.rows.read().await;
        Ok(rows.get(provider_ref).cloned())
    }

    async fn create(&self, payment: CreatePayment) -> DbResult<Payment> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&payment.provider_ref) {
            return Err(DbError::Duplicate("payment".into()));
        }
        let row = Payment {
            id: payment.id,
            provider_ref: payment.provider_ref.clone(),
            provider: payment.provider,
            amount: payment.amount,
            fee_amount: payment.fee_amount,
            merchant_amount: payment.merchant_amount,
            status: PaymentStatus::Pending,
            status_reason: None,
            order_ref: payment.order_ref,
            merchant_id: payment.merchant_id,
            disbursement_id: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        rows.insert(payment.provider_ref, row.clone());
        Ok(row)
    }

    async fn transition(
        &self,
        provider_ref: &str,
        from: &[PaymentStatus],
        to: PaymentStatus,
        reason: Option<&str>,
    ) -> DbResult<Transition<PaymentStatus>> {
        // The write lock is held across check and mutate, mirroring the
        // single guarded UPDATE of the Postgres implementation.
        let mut rows = self.rows.write().await;
        let row = rows.get_mut(provider_ref).ok_or(DbError::NotFound)?;
        if !from.contains(&row.status) {
            return Ok(Transition {
                applied: false,
                status: row.status,
            });
        }
        row.status = to;
        if let Some(reason) = reason {
            row.status_reason = Some(reason.to_string());
        }
        row.completed_at.get_or_insert_with(Utc::now);
        Ok(Transition {
            applied: true,
            status: to,
        })
    }

    async fn link_disbursement(&self, id: Uuid, disbursement_id: Uuid) -> DbResult<()> {
        let mut rows = self.rows.write().await;
        if let Some(row) = rows.values_mut().find(|p| p.id == id) {
            row.disbursement_id = Some(disbursement_id);
        }
        Ok(())
    }
}

/// In-memory subscription repository keyed by billing reference
#[derive(Default)]
pub struct MemorySubscriptionRepository {
    rows: RwLock<HashMap<String, Subscription>>,
}

#[async_trait]
impl SubscriptionRepository for MemorySubscriptionRepository {
    async fn find_by_reference(&self, reference: &str) -> DbResult<Option<Subscription>> {
        let rows = self.rows.read().await;
        Ok(rows.get(reference).cloned())
    }

    async fn find_by_subscription_code(&self, code: &str) -> DbResult<Option<Subscription>> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .find(|s| s.subscription_code.as_deref() == Some(code))
            .cloned())
    }

    async fn find_current_by_user(&self, user_id: Uuid) -> DbResult<Option<Subscription>> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|s| {
                s.user_id == user_id
                    && matches!(
                        s.status,
                        SubscriptionStatus::Active | SubscriptionStatus::Trialing
                    )
            })
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn create(&self, sub: CreateSubscription) -> DbResult<Subscription> {
        let mut rows = self.rows.write().await;
        if let Some(existing) = rows.get(&sub.reference) {
            if existing.status != SubscriptionStatus::Trialing {
                return Err(DbError::Duplicate(format!("subscription {}", sub.reference)));
            }
        }
        // One live subscription per user, mirroring the partial unique
        // index in the Postgres schema.
        let has_other_current = rows.values().any(|s| {
            s.user_id == sub.user_id
                && s.reference != sub.reference
                && matches!(
                    s.status,
                    SubscriptionStatus::Active | SubscriptionStatus::Trialing
                )
        });
        if has_other_current {
            return Err(DbError::Duplicate(format!(
                "user {} already has a live subscription",
                sub.user_id
            )));
        }
        let now = Utc::now();
        let row = Subscription {
            id: sub.id,
            user_id: sub.user_id,
            plan: sub.plan,
            reference: sub.reference.clone(),
            subscription_code: None,
            status: SubscriptionStatus::Trialing,
            started_at: None,
            expires_at: None,
            created_at: now,
            updated_at: now,
        };
        rows.insert(sub.reference, row.clone());
        Ok(row)
    }

    async fn transition(
        &self,
        reference: &str,
        from: &[SubscriptionStatus],
        to: SubscriptionStatus,
        expires_at: Option<DateTime<Utc>>,
    ) -> DbResult<Transition<SubscriptionStatus>> {
        let mut rows = self.rows.write().await;
        let row = rows.get_mut(reference).ok_or(DbError::NotFound)?;
        if !from.contains(&row.status) {
            return Ok(Transition {
                applied: false,
                status: row.status,
            });
        }
        row.status = to;
        if to == SubscriptionStatus::Active {
            row.started_at.get_or_insert_with(Utc::now);
        }
        if let Some(at) = expires_at {
            row.expires_at = Some(at);
        }
        row.updated_at = Utc::now();
        Ok(Transition {
            applied: true,
            status: to,
        })
    }

    async fn set_subscription_code(&self, reference: &str, code: &str) -> DbResult<()> {
        let mut rows = self.rows.write().await;
        if let Some(row) = rows.get_mut(reference) {
            row.subscription_code = Some(code.to_string());
            row.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn expire_overdue(&self, now: DateTime<Utc>) -> DbResult<u64> {
        let mut rows = self.rows.write().await;
        let mut expired = 0;
        for row in rows.values_mut() {
            if row.status == SubscriptionStatus::Active
                && row.expires_at.is_some_and(|at| at <= now)
            {
                row.status = SubscriptionStatus::Expired;
                row.updated_at = now;
                expired += 1;
            }
        }
        Ok(expired)
    }
}

/// In-memory disbursement repository
#[derive(Default)]
pub struct MemoryDisbursementRepository {
    rows: RwLock<HashMap<Uuid, Disbursement>>,
}

#[async_trait]
impl DisbursementRepository for MemoryDisbursementRepository {
    async fn find_by_payment_id(&self, payment_id: Uuid) -> DbResult<Option<Disbursement>> {
        let rows = self.rows.read().await;
        Ok(rows.values().find(|d| d.payment_id == payment_id).cloned())
    }

    async fn find_by_provider_ref(&self, provider_ref: &str) -> DbResult<Option<Disbursement>> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .find(|d| d.provider_ref.as_deref() == Some(provider_ref))
            .cloned())
    }

    async fn create(&self, disbursement: CreateDisbursement) -> DbResult<Disbursement> {
        let mut rows = self.rows.write().await;
        if rows
            .values()
            .any(|d| d.payment_id == disbursement.payment_id)
        {
            return Err(DbError::Duplicate("disbursement".into()));
        }
        let row = Disbursement {
            id: disbursement.id,
            payment_id: disbursement.payment_id,
            provider_ref: None,
            amount: disbursement.amount,
            bank_code: disbursement.bank_code,
            account_number: disbursement.account_number,
            account_name: disbursement.account_name,
            account_type: disbursement.account_type,
            status: DisbursementStatus::Submitted,
            failure_reason: None,
            submitted_at: Utc::now(),
            completed_at: None,
        };
        rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn set_provider_ref(&self, id: Uuid, provider_ref: &str) -> DbResult<()> {
        let mut rows = self.rows.write().await;
        if let Some(row) = rows.get_mut(&id) {
            row.provider_ref = Some(provider_ref.to_string());
        }
        Ok(())
    }

    async fn transition(
        &self,
        provider_ref: &str,
        from: &[DisbursementStatus],
        to: DisbursementStatus,
        failure_reason: Option<&str>,
    ) -> DbResult<Transition<DisbursementStatus>> {
        let mut rows = self.rows.write().await;
        let row = rows
            .values_mut()
            .find(|d| d.provider_ref.as_deref() == Some(provider_ref))
            .ok_or(DbError::NotFound)?;
        if !from.contains(&row.status) {
            return Ok(Transition {
                applied: false,
                status: row.status,
            });
        }
        row.status = to;
        if let Some(reason) = failure_reason {
            row.failure_reason = Some(reason.to_string());
        }
        if to.is_terminal() {
            row.completed_at.get_or_insert_with(Utc::now);
        }
        Ok(Transition {
            applied: true,
            status: to,
        })
    }

    async fn mark_error(&self, id: Uuid, reason: &str) -> DbResult<()> {
        let mut rows = self.rows.write().await;
        if let Some(row) = rows.get_mut(&id) {
            row.status = DisbursementStatus::Error;
            row.failure_reason = Some(reason.to_string());
            row.completed_at.get_or_insert_with(Utc::now);
        }
        Ok(())
    }
}

/// In-memory merchant repository
#[derive(Default)]
pub struct MemoryMerchantRepository {
    rows: RwLock<HashMap<Uuid, Merchant>>,
}

impl MemoryMerchantRepository {
    /// Seed a merchant (test setup)
    pub async fn insert(&self, merchant: Merchant) {
        self.rows.write().await.insert(merchant.id, merchant);
    }
}

#[async_trait]
impl MerchantRepository for MemoryMerchantRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<Merchant>> {
        let rows = self.rows.read().await;
        Ok(rows.get(&id).cloned())
    }
}

/// In-memory entitlement repository
#[derive(Default)]
pub struct MemoryEntitlementRepository {
    rows: RwLock<HashMap<Uuid, Vec<Capability>>>,
}

#[async_trait]
impl EntitlementRepository for MemoryEntitlementRepository {
    async fn replace_for_subscription(
        &self,
        subscription_id: Uuid,
        capabilities: &[Capability],
    ) -> DbResult<()> {
        self.rows
            .write()
            .await
            .insert(subscription_id, capabilities.to_vec());
        Ok(())
    }

    async fn list_for_subscription(&self, subscription_id: Uuid) -> DbResult<Vec<Capability>> {
        let rows = self.rows.read().await;
        Ok(rows.get(&subscription_id).cloned().unwrap_or_default())
    }
}

/// In-memory webhook delivery ledger
#[derive(Default)]
pub struct MemoryEventLedger {
    seen: RwLock<HashSet<(Provider, String)>>,
}

#[async_trait]
impl EventLedger for MemoryEventLedger {
    async fn record(
        &self,
        provider: Provider,
        fingerprint: &str,
        _event_type: &str,
    ) -> DbResult<bool> {
        let mut seen = self.seen.write().await;
        Ok(seen.insert((provider, fingerprint.to_string())))
    }
}

/// All in-memory repositories bundled together
#[derive(Clone, Default)]
pub struct MemoryRepositories {
    pub payments: Arc<MemoryPaymentRepository>,
    pub subscriptions: Arc<MemorySubscriptionRepository>,
    pub disbursements: Arc<MemoryDisbursementRepository>,
    pub merchants: Arc<MemoryMerchantRepository>,
    pub entitlements: Arc<MemoryEntitlementRepository>,
    pub ledger: Arc<MemoryEventLedger>,
}

impl MemoryRepositories {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}
