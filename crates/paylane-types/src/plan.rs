//! Plans and capability entitlements

use serde::{Deserialize, Serialize};

use crate::ParseStatusError;

/// Subscription plan kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanKind {
    /// Recurring bundle covering the full platform
    Bundle,
    /// One-off purchase of the base commerce services
    Custom,
}

impl PlanKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bundle => "bundle",
            Self::Custom => "custom",
        }
    }

    /// Capabilities granted by this plan.
    ///
    /// Entitlements are always derived from here; they are never edited
    /// directly.
    pub const fn capabilities(&self) -> &'static [Capability] {
        match self {
            Self::Bundle => &[
                Capability::Storefront,
                Capability::CardPayments,
                Capability::EftPayments,
                Capability::Payouts,
                Capability::RecurringBilling,
                Capability::SalesReports,
            ],
            Self::Custom => &[
                Capability::Storefront,
                Capability::CardPayments,
                Capability::EftPayments,
                Capability::Payouts,
            ],
        }
    }
}

impl std::fmt::Display for PlanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PlanKind {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bundle" => Ok(Self::Bundle),
            "custom" => Ok(Self::Custom),
            other => Err(ParseStatusError::new("plan kind", other)),
        }
    }
}

/// A service capability a subscription can grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Hosted storefront
    Storefront,
    /// Accept card payments
    CardPayments,
    /// Accept instant-EFT payments
    EftPayments,
    /// Receive split payouts
    Payouts,
    /// Bill customers on a schedule
    RecurringBilling,
    /// Sales reporting
    SalesReports,
}

impl Capability {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Storefront => "storefront",
            Self::CardPayments => "card_payments",
            Self::EftPayments => "eft_payments",
            Self::Payouts => "payouts",
            Self::RecurringBilling => "recurring_billing",
            Self::SalesReports => "sales_reports",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Capability {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "storefront" => Ok(Self::Storefront),
            "card_payments" => Ok(Self::CardPayments),
            "eft_payments" => Ok(Self::EftPayments),
            "payouts" => Ok(Self::Payouts),
            "recurring_billing" => Ok(Self::RecurringBilling),
            "sales_reports" => Ok(Self::SalesReports),
            other => Err(ParseStatusError::new("capability", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_grants_everything_custom_grants() {
        let bundle = PlanKind::Bundle.capabilities();
        for cap in PlanKind::Custom.capabilities() {
            assert!(bundle.contains(cap));
        }
    }
}
