//! Engine configuration

/// Reconciliation engine configuration
#[derive(Debug, Clone)]
pub struct ReconConfig {
    /// Platform commission in basis points, applied to the gross amount
    /// when a payment record is created
    pub commission_bps: u16,
    /// Billing period length used when a cancellation carries no period
    /// end of its own
    pub billing_period_days: i64,
}

impl ReconConfig {
    /// Create a new engine config with the given commission
    pub fn new(commission_bps: u16) -> Self {
        Self {
            commission_bps,
            billing_period_days: 30,
        }
    }

    /// Override the billing period length
    pub fn with_billing_period_days(mut self, days: i64) -> Self {
        self.billing_period_days = days;
        self
    }
}
