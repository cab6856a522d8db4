//! PostgreSQL repository implementations

mod disbursement;
mod entitlement;
mod ledger;
mod merchant;
mod payment;
mod subscription;

pub use disbursement::PgDisbursementRepository;
pub use entitlement::PgEntitlementRepository;
pub use ledger::PgEventLedger;
pub use merchant::PgMerchantRepository;
pub use payment::PgPaymentRepository;
pub use subscription::PgSubscriptionRepository;

use crate::DbPool;

/// All repositories bundled together
#[derive(Clone)]
pub struct Repositories {
    pub payments: PgPaymentRepository,
    pub subscriptions: PgSubscriptionRepository,
    pub disbursements: PgDisbursementRepository,
    pub merchants: PgMerchantRepository,
    pub entitlements: PgEntitlementRepository,
    pub ledger: PgEventLedger,
}

impl Repositories {
    /// Create all repositories from a database pool
    pub fn new(pool: DbPool) -> Self {
        Self {
            payments: PgPaymentRepository::new(pool.clone()),
            subscriptions: PgSubscriptionRepository::new(pool.clone()),
            disbursements: PgDisbursementRepository::new(pool.clone()),
            merchants: PgMerchantRepository::new(pool.clone()),
            entitlements: PgEntitlementRepository::new(pool.clone()),
            ledger: PgEventLedger::new(pool),
        }
    }
}
