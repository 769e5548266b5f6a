//! Domain types for the credit ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription tiers, in ascending order of monthly allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    /// One-time trial allocation; never resets.
    Trial,
    /// Entry-level paid tier.
    Starter,
    /// Mid-level paid tier.
    Professional,
    /// Top paid tier.
    Enterprise,
}

impl SubscriptionTier {
    /// All tiers, for data-driven iteration in tests and seeds.
    pub const ALL: [Self; 4] = [
        Self::Trial,
        Self::Starter,
        Self::Professional,
        Self::Enterprise,
    ];

    /// Stable string form used in persistence and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trial => "trial",
            Self::Starter => "starter",
            Self::Professional => "professional",
            Self::Enterprise => "enterprise",
        }
    }
}

impl std::fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of credit ledger transaction, append-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditOperation {
    /// Consumption of credits by a billable feature.
    Deduct,
    /// One-time credit pack purchase.
    Purchase,
    /// Monthly allocation reset.
    Reset,
}

impl CreditOperation {
    /// Stable string form used in persistence and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deduct => "deduct",
            Self::Purchase => "purchase",
            Self::Reset => "reset",
        }
    }
}

/// A tenant's credit balance snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Credits remaining in the monthly pool.
    pub monthly: i32,
    /// Credits remaining in the purchased pool (never expire).
    pub purchased: i32,
    /// Credits consumed since the last reset.
    pub used_this_month: i32,
    /// When the monthly pool next resets.
    pub reset_date: DateTime<Utc>,
}

impl Balance {
    /// Total spendable credits across both pools.
    #[must_use]
    pub fn total(&self) -> i64 {
        i64::from(self.monthly) + i64::from(self.purchased)
    }

    /// Whether the balance can cover `required` credits.
    #[must_use]
    pub fn covers(&self, required: i32) -> bool {
        self.total() >= i64::from(required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance(monthly: i32, purchased: i32) -> Balance {
        Balance {
            monthly,
            purchased,
            used_this_month: 0,
            reset_date: Utc::now(),
        }
    }

    #[test]
    fn test_total_sums_both_pools() {
        assert_eq!(balance(3, 5).total(), 8);
        assert_eq!(balance(0, 0).total(), 0);
    }

    #[test]
    fn test_total_does_not_overflow_i32() {
        assert_eq!(balance(i32::MAX, i32::MAX).total(), 2 * i64::from(i32::MAX));
    }

    #[test]
    fn test_covers() {
        assert!(balance(3, 5).covers(8));
        assert!(!balance(3, 5).covers(9));
        assert!(balance(0, 1).covers(1));
        assert!(!balance(0, 0).covers(1));
    }

    #[test]
    fn test_tier_string_round_trip() {
        for tier in SubscriptionTier::ALL {
            let json = serde_json::to_string(&tier).unwrap();
            assert_eq!(json, format!("\"{}\"", tier.as_str()));
        }
    }
}
