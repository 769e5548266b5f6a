//! Tenant repository: account lookup and creation.
//!
//! Balance columns are zeroed at insert; `CreditRepository::initialize`
//! grants the tier allocation afterwards and owns those columns from then
//! on.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, Set};
use uuid::Uuid;

use velora_core::credits::SubscriptionTier;
use velora_shared::types::TenantId;

use crate::entities::tenants;

/// Input for creating a tenant account.
#[derive(Debug, Clone)]
pub struct CreateTenantInput {
    pub name: String,
    pub tier: SubscriptionTier,
    /// IANA timezone name, e.g. `America/New_York`.
    pub timezone: String,
}

/// Tenant repository.
#[derive(Debug, Clone)]
pub struct TenantRepository {
    db: DatabaseConnection,
}

impl TenantRepository {
    /// Creates a new tenant repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts a tenant with an empty balance.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn create(&self, input: CreateTenantInput) -> Result<tenants::Model, DbErr> {
        let now = Utc::now();
        tenants::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            subscription_tier: Set(input.tier.into()),
            timezone: Set(input.timezone),
            monthly_credits: Set(0),
            purchased_credits: Set(0),
            credits_used_this_month: Set(0),
            credits_reset_date: Set(now.into()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&self.db)
        .await
    }

    /// Looks up a tenant by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_by_id(&self, id: TenantId) -> Result<Option<tenants::Model>, DbErr> {
        tenants::Entity::find_by_id(id.into_inner()).one(&self.db).await
    }
}
