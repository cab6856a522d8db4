//! Paylane Types - Shared domain types
//!
//! This crate contains the domain types used across Paylane services:
//! - Payments and their settlement status
//! - Merchant subscriptions, plans and capability entitlements
//! - Disbursements (merchant payouts) and bank details

pub mod disbursement;
pub mod error;
pub mod merchant;
pub mod payment;
pub mod plan;
pub mod provider;
pub mod subscription;

pub use disbursement::*;
pub use error::*;
pub use merchant::*;
pub use payment::*;
pub use plan::*;
pub use provider::*;
pub use subscription::*;
