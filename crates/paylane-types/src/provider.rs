//! Payment provider identifiers

use serde::{Deserialize, Serialize};

use crate::ParseStatusError;

/// External payment provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Card charges and subscription billing
    Paystack,
    /// Bank EFT pay-ins and merchant disbursements
    Stitch,
}

impl Provider {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Paystack => "paystack",
            Self::Stitch => "stitch",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paystack" => Ok(Self::Paystack),
            "stitch" => Ok(Self::Stitch),
            other => Err(ParseStatusError::new("provider", other)),
        }
    }
}
