//! `SeaORM` active enums mapped to Postgres enum types.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Subscription tiers, mirroring `velora_core::credits::SubscriptionTier`.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "subscription_tier")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    /// One-time trial allocation.
    #[sea_orm(string_value = "trial")]
    Trial,
    /// Entry-level paid tier.
    #[sea_orm(string_value = "starter")]
    Starter,
    /// Mid-level paid tier.
    #[sea_orm(string_value = "professional")]
    Professional,
    /// Top paid tier.
    #[sea_orm(string_value = "enterprise")]
    Enterprise,
}

impl From<SubscriptionTier> for velora_core::credits::SubscriptionTier {
    fn from(tier: SubscriptionTier) -> Self {
        match tier {
            SubscriptionTier::Trial => Self::Trial,
            SubscriptionTier::Starter => Self::Starter,
            SubscriptionTier::Professional => Self::Professional,
            SubscriptionTier::Enterprise => Self::Enterprise,
        }
    }
}

impl From<velora_core::credits::SubscriptionTier> for SubscriptionTier {
    fn from(tier: velora_core::credits::SubscriptionTier) -> Self {
        use velora_core::credits::SubscriptionTier as Core;
        match tier {
            Core::Trial => Self::Trial,
            Core::Starter => Self::Starter,
            Core::Professional => Self::Professional,
            Core::Enterprise => Self::Enterprise,
        }
    }
}

/// Credit ledger operation kinds.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "credit_operation")]
#[serde(rename_all = "snake_case")]
pub enum CreditOperation {
    /// Consumption by a billable feature.
    #[sea_orm(string_value = "deduct")]
    Deduct,
    /// One-time pack purchase.
    #[sea_orm(string_value = "purchase")]
    Purchase,
    /// Monthly allocation reset.
    #[sea_orm(string_value = "reset")]
    Reset,
}

/// Appointment lifecycle states.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "appointment_status")]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    /// Awaiting confirmation.
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Confirmed by the customer.
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    /// Service delivered.
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Cancelled ahead of time.
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    /// Customer did not show up.
    #[sea_orm(string_value = "no_show")]
    NoShow,
}
