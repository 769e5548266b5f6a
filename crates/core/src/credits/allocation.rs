//! Tier allocation table and deduction arithmetic.

use serde::{Deserialize, Serialize};

use super::error::CreditError;
use super::types::SubscriptionTier;

/// Monthly credit allocation for a subscription tier.
///
/// Allocation rules are data, not branching logic, so the table can grow
/// without touching the ledger code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierAllocation {
    /// The tier this allocation belongs to.
    pub tier: SubscriptionTier,
    /// Credits granted per billing cycle.
    pub monthly_credits: i32,
    /// Whether the allocation renews each cycle. Trial is a one-time grant.
    pub resets_monthly: bool,
}

/// The allocation table, keyed by tier.
const ALLOCATIONS: [TierAllocation; 4] = [
    TierAllocation {
        tier: SubscriptionTier::Trial,
        monthly_credits: 50,
        resets_monthly: false,
    },
    TierAllocation {
        tier: SubscriptionTier::Starter,
        monthly_credits: 500,
        resets_monthly: true,
    },
    TierAllocation {
        tier: SubscriptionTier::Professional,
        monthly_credits: 2000,
        resets_monthly: true,
    },
    TierAllocation {
        tier: SubscriptionTier::Enterprise,
        monthly_credits: 10_000,
        resets_monthly: true,
    },
];

impl TierAllocation {
    /// Looks up the allocation for a tier.
    #[must_use]
    pub fn for_tier(tier: SubscriptionTier) -> Self {
        // The table covers every tier; the fallback is unreachable.
        ALLOCATIONS
            .iter()
            .copied()
            .find(|a| a.tier == tier)
            .unwrap_or(ALLOCATIONS[0])
    }
}

/// Cost of an SMS campaign in credits.
///
/// Recipients are billed in blocks of one hundred, rounded up.
#[must_use]
pub fn campaign_cost(recipient_count: u32, per_hundred_rate: i32) -> i64 {
    let blocks = i64::from(recipient_count.div_ceil(100));
    blocks * i64::from(per_hundred_rate)
}

/// The result of splitting a deduction across the two pools.
///
/// The monthly pool is drained first; only the remainder comes out of the
/// purchased pool. Both remaining pools are guaranteed non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeductionSplit {
    /// Credits taken from the monthly pool.
    pub from_monthly: i32,
    /// Credits taken from the purchased pool.
    pub from_purchased: i32,
    /// Monthly pool after the deduction.
    pub remaining_monthly: i32,
    /// Purchased pool after the deduction.
    pub remaining_purchased: i32,
}

impl DeductionSplit {
    /// Computes the monthly-first split for deducting `amount`.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` when `amount` is zero or negative.
    /// - `InsufficientCredits` when the pools together cannot cover `amount`;
    ///   the input pools are untouched by a failed computation.
    pub fn compute(monthly: i32, purchased: i32, amount: i32) -> Result<Self, CreditError> {
        if amount <= 0 {
            return Err(CreditError::InvalidAmount(amount));
        }

        let total = i64::from(monthly) + i64::from(purchased);
        if total < i64::from(amount) {
            return Err(CreditError::InsufficientCredits {
                available: total,
                required: i64::from(amount),
            });
        }

        let from_monthly = monthly.min(amount);
        let from_purchased = amount - from_monthly;

        Ok(Self {
            from_monthly,
            from_purchased,
            remaining_monthly: monthly - from_monthly,
            remaining_purchased: purchased - from_purchased,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(SubscriptionTier::Trial, 50, false)]
    #[case(SubscriptionTier::Starter, 500, true)]
    #[case(SubscriptionTier::Professional, 2000, true)]
    #[case(SubscriptionTier::Enterprise, 10_000, true)]
    fn test_allocation_table(
        #[case] tier: SubscriptionTier,
        #[case] credits: i32,
        #[case] resets: bool,
    ) {
        let allocation = TierAllocation::for_tier(tier);
        assert_eq!(allocation.monthly_credits, credits);
        assert_eq!(allocation.resets_monthly, resets);
    }

    #[rstest]
    #[case(0, 1, 0)]
    #[case(1, 1, 1)]
    #[case(100, 1, 1)]
    #[case(101, 1, 2)]
    #[case(250, 3, 9)]
    #[case(1000, 5, 50)]
    fn test_campaign_cost_rounds_up_per_hundred(
        #[case] recipients: u32,
        #[case] rate: i32,
        #[case] expected: i64,
    ) {
        assert_eq!(campaign_cost(recipients, rate), expected);
    }

    #[test]
    fn test_split_monthly_pool_first() {
        // Scenario from the ledger contract: monthly=3, purchased=5, deduct 5.
        let split = DeductionSplit::compute(3, 5, 5).unwrap();
        assert_eq!(split.from_monthly, 3);
        assert_eq!(split.from_purchased, 2);
        assert_eq!(split.remaining_monthly, 0);
        assert_eq!(split.remaining_purchased, 3);
    }

    #[test]
    fn test_split_monthly_covers_everything() {
        let split = DeductionSplit::compute(10, 5, 4).unwrap();
        assert_eq!(split.from_monthly, 4);
        assert_eq!(split.from_purchased, 0);
        assert_eq!(split.remaining_monthly, 6);
        assert_eq!(split.remaining_purchased, 5);
    }

    #[test]
    fn test_split_empty_pools_fails() {
        let err = DeductionSplit::compute(0, 0, 1).unwrap_err();
        assert!(matches!(
            err,
            CreditError::InsufficientCredits {
                available: 0,
                required: 1,
            }
        ));
    }

    #[test]
    fn test_split_rejects_non_positive_amounts() {
        assert!(matches!(
            DeductionSplit::compute(10, 10, 0),
            Err(CreditError::InvalidAmount(0))
        ));
        assert!(matches!(
            DeductionSplit::compute(10, 10, -5),
            Err(CreditError::InvalidAmount(-5))
        ));
    }

    proptest! {
        /// For any affordable deduction, the split conserves credits exactly
        /// and never drives a pool negative.
        #[test]
        fn prop_split_conserves_credits(
            monthly in 0..100_000i32,
            purchased in 0..100_000i32,
            amount in 1..150_000i32,
        ) {
            prop_assume!(i64::from(monthly) + i64::from(purchased) >= i64::from(amount));

            let split = DeductionSplit::compute(monthly, purchased, amount).unwrap();

            prop_assert_eq!(split.from_monthly + split.from_purchased, amount);
            prop_assert_eq!(split.remaining_monthly, monthly - split.from_monthly);
            prop_assert_eq!(split.remaining_purchased, purchased - split.from_purchased);
            prop_assert!(split.remaining_monthly >= 0);
            prop_assert!(split.remaining_purchased >= 0);
        }

        /// The purchased pool is only touched once the monthly pool is drained.
        #[test]
        fn prop_purchased_untouched_until_monthly_exhausted(
            monthly in 0..10_000i32,
            purchased in 0..10_000i32,
            amount in 1..20_000i32,
        ) {
            prop_assume!(i64::from(monthly) + i64::from(purchased) >= i64::from(amount));

            let split = DeductionSplit::compute(monthly, purchased, amount).unwrap();

            if split.from_purchased > 0 {
                prop_assert_eq!(split.remaining_monthly, 0);
            }
        }

        /// An unaffordable deduction always fails and reports the true totals.
        #[test]
        fn prop_unaffordable_deduction_fails(
            monthly in 0..1000i32,
            purchased in 0..1000i32,
            excess in 1..1000i32,
        ) {
            let amount = monthly + purchased + excess;
            let err = DeductionSplit::compute(monthly, purchased, amount).unwrap_err();

            match err {
                CreditError::InsufficientCredits { available, required } => {
                    prop_assert_eq!(available, i64::from(monthly) + i64::from(purchased));
                    prop_assert_eq!(required, i64::from(amount));
                }
                other => prop_assert!(false, "unexpected error: {other}"),
            }
        }
    }
}
