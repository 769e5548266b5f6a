//! Credit pool arithmetic and tier allocations.
//!
//! This module implements the pure logic of the credit ledger:
//! - Balance snapshots (monthly pool + non-expiring purchased pool)
//! - Tier-keyed monthly allocation table
//! - Monthly-first deduction splits
//! - Campaign cost calculation (ceiling per hundred recipients)
//! - Error types for ledger operations

pub mod allocation;
pub mod error;
pub mod types;

pub use allocation::{campaign_cost, DeductionSplit, TierAllocation};
pub use error::CreditError;
pub use types::{Balance, CreditOperation, SubscriptionTier};
