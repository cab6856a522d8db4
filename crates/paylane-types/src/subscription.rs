//! Subscription types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ParseStatusError, PlanKind};

/// Subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Created at checkout, awaiting the first settled charge
    Trialing,
    /// Billing confirmed by the provider
    Active,
    /// A renewal charge failed; the provider is retrying
    PastDue,
    /// Cancelled; access runs until `expires_at`
    Cancelled,
    /// Paid period is over
    Expired,
}

impl SubscriptionStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trialing => "trialing",
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trialing" => Ok(Self::Trialing),
            "active" => Ok(Self::Active),
            "past_due" => Ok(Self::PastDue),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            other => Err(ParseStatusError::new("subscription status", other)),
        }
    }
}

/// A merchant's platform-fee subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    /// Subscription ID
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Plan purchased
    pub plan: PlanKind,
    /// External billing reference (the checkout charge reference)
    pub reference: String,
    /// Recurring billing code at the provider, once known
    pub subscription_code: Option<String>,
    /// Lifecycle status
    pub status: SubscriptionStatus,
    /// When billing was first confirmed
    pub started_at: Option<DateTime<Utc>>,
    /// End of the paid period; access stops here, not at cancellation
    pub expires_at: Option<DateTime<Utc>>,
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// Last mutation
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Whether the subscription grants its capabilities at `now`.
    ///
    /// Cancellation keeps access until the end of the paid period, so this
    /// must consult `expires_at` and never the status alone.
    pub fn is_entitled(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            SubscriptionStatus::Trialing | SubscriptionStatus::Active => true,
            SubscriptionStatus::PastDue | SubscriptionStatus::Cancelled => {
                self.expires_at.is_none_or(|at| now < at)
            }
            SubscriptionStatus::Expired => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn subscription(status: SubscriptionStatus, expires_at: Option<DateTime<Utc>>) -> Subscription {
        let now = Utc::now();
        Subscription {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            plan: PlanKind::Bundle,
            reference: "ref_1".into(),
            subscription_code: None,
            status,
            started_at: Some(now),
            expires_at,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn cancelled_keeps_access_until_expiry() {
        let now = Utc::now();
        let sub = subscription(SubscriptionStatus::Cancelled, Some(now + Duration::days(10)));
        assert!(sub.is_entitled(now));
        assert!(!sub.is_entitled(now + Duration::days(11)));
    }

    #[test]
    fn expired_never_entitled() {
        let sub = subscription(SubscriptionStatus::Expired, None);
        assert!(!sub.is_entitled(Utc::now()));
    }
}
