//! Credit ledger repository: the single source of truth for tenant credit
//! balances and their append-only history.
//!
//! Every balance mutation is an atomic conditional `UPDATE` guarded at the
//! storage layer, paired with a ledger-row insert inside one database
//! transaction. A read-then-write sequence is an overdraft hazard under
//! concurrent schedulers and must never be introduced here.

use chrono::{Months, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbBackend, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    Statement, TransactionTrait,
};
use serde_json::json;
use uuid::Uuid;

use velora_core::credits::{Balance, CreditError, SubscriptionTier, TierAllocation};
use velora_shared::types::{PageRequest, TenantId};

use crate::entities::{
    credit_transactions, sea_orm_active_enums::CreditOperation, tenants,
};

/// Effectively "never" for the trial tier's one-time allocation.
const TRIAL_RESET_YEARS: u32 = 100;

/// Credit ledger repository.
#[derive(Debug, Clone)]
pub struct CreditRepository {
    db: DatabaseConnection,
}

impl CreditRepository {
    /// Creates a new credit repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Returns a tenant's current balance snapshot.
    ///
    /// # Errors
    ///
    /// `TenantNotFound` when the tenant does not exist; `BalanceUnavailable`
    /// when the read itself fails.
    pub async fn balance(&self, tenant_id: TenantId) -> Result<Balance, CreditError> {
        let tenant = tenants::Entity::find_by_id(tenant_id.into_inner())
            .one(&self.db)
            .await
            .map_err(|e| CreditError::BalanceUnavailable(e.to_string()))?
            .ok_or(CreditError::TenantNotFound(tenant_id))?;

        Ok(balance_from_tenant(&tenant))
    }

    /// Whether the tenant can cover `required` credits. Pure read.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::balance`].
    pub async fn has_credits(
        &self,
        tenant_id: TenantId,
        required: i32,
    ) -> Result<bool, CreditError> {
        let balance = self.balance(tenant_id).await?;
        Ok(balance.covers(required))
    }

    /// Deducts `amount` credits, monthly pool first.
    ///
    /// The balance update and the ledger insert commit together or not at
    /// all. On success the returned balance reflects the deduction and
    /// exactly one `deduct` transaction row exists with `balance_after`
    /// equal to the new total.
    ///
    /// # Errors
    ///
    /// `InsufficientCredits` when the pools cannot cover `amount`; balances
    /// and the ledger are untouched. `InvalidAmount` for non-positive
    /// amounts.
    pub async fn deduct(
        &self,
        tenant_id: TenantId,
        amount: i32,
        feature: &str,
        metadata: serde_json::Value,
    ) -> Result<Balance, CreditError> {
        if amount <= 0 {
            return Err(CreditError::InvalidAmount(amount));
        }

        let txn = self.db.begin().await.map_err(db_err)?;

        // Single conditional UPDATE: the WHERE clause serializes concurrent
        // deductions and makes overdraft impossible. Right-hand sides see
        // pre-update column values, so the monthly-first split is computed
        // against a consistent snapshot.
        let row = txn
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                r"
                UPDATE tenants
                SET monthly_credits = monthly_credits - LEAST(monthly_credits, $1),
                    purchased_credits = purchased_credits - GREATEST($1 - monthly_credits, 0),
                    credits_used_this_month = credits_used_this_month + $1,
                    updated_at = now()
                WHERE id = $2
                  AND monthly_credits + purchased_credits >= $1
                RETURNING monthly_credits, purchased_credits, credits_used_this_month, credits_reset_date
                ",
                [amount.into(), tenant_id.into_inner().into()],
            ))
            .await
            .map_err(db_err)?;

        let Some(row) = row else {
            // Zero rows: distinguish a missing tenant from an uncovered amount.
            let tenant = tenants::Entity::find_by_id(tenant_id.into_inner())
                .one(&txn)
                .await
                .map_err(db_err)?
                .ok_or(CreditError::TenantNotFound(tenant_id))?;
            return Err(CreditError::InsufficientCredits {
                available: balance_from_tenant(&tenant).total(),
                required: i64::from(amount),
            });
        };

        let balance = balance_from_row(&row).map_err(db_err)?;

        insert_transaction(
            &txn,
            tenant_id,
            -amount,
            CreditOperation::Deduct,
            feature,
            metadata,
            &balance,
        )
        .await?;

        txn.commit().await.map_err(db_err)?;
        Ok(balance)
    }

    /// Adds purchased credits from a one-time pack purchase.
    ///
    /// Purchased credits never expire and survive monthly resets.
    ///
    /// # Errors
    ///
    /// `TenantNotFound` when the tenant does not exist; `InvalidAmount` for
    /// non-positive pack sizes.
    pub async fn add_purchased(
        &self,
        tenant_id: TenantId,
        credits: i32,
        pack_id: &str,
        payment_ref: &str,
    ) -> Result<Balance, CreditError> {
        if credits <= 0 {
            return Err(CreditError::InvalidAmount(credits));
        }

        let txn = self.db.begin().await.map_err(db_err)?;

        let row = txn
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                r"
                UPDATE tenants
                SET purchased_credits = purchased_credits + $1,
                    updated_at = now()
                WHERE id = $2
                RETURNING monthly_credits, purchased_credits, credits_used_this_month, credits_reset_date
                ",
                [credits.into(), tenant_id.into_inner().into()],
            ))
            .await
            .map_err(db_err)?
            .ok_or(CreditError::TenantNotFound(tenant_id))?;

        let balance = balance_from_row(&row).map_err(db_err)?;

        insert_transaction(
            &txn,
            tenant_id,
            credits,
            CreditOperation::Purchase,
            "credit_pack",
            json!({ "pack_id": pack_id, "payment_ref": payment_ref }),
            &balance,
        )
        .await?;

        txn.commit().await.map_err(db_err)?;
        Ok(balance)
    }

    /// Resets the monthly pool to the tenant's tier allocation.
    ///
    /// Guarded by `credits_reset_date <= now()`: a duplicate billing-cycle
    /// trigger within the same cycle affects zero rows and returns
    /// `Ok(false)` without double-allocating. The trial tier's far-future
    /// reset date means this guard never passes for it.
    ///
    /// # Errors
    ///
    /// `TenantNotFound` when the tenant does not exist.
    pub async fn reset_monthly(&self, tenant_id: TenantId) -> Result<bool, CreditError> {
        let tenant = tenants::Entity::find_by_id(tenant_id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or(CreditError::TenantNotFound(tenant_id))?;

        let tier: SubscriptionTier = tenant.subscription_tier.into();
        let allocation = TierAllocation::for_tier(tier);

        let txn = self.db.begin().await.map_err(db_err)?;

        let row = txn
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                r"
                UPDATE tenants
                SET monthly_credits = $1,
                    credits_used_this_month = 0,
                    credits_reset_date = credits_reset_date + INTERVAL '1 month',
                    updated_at = now()
                WHERE id = $2
                  AND credits_reset_date <= now()
                RETURNING monthly_credits, purchased_credits, credits_used_this_month, credits_reset_date
                ",
                [
                    allocation.monthly_credits.into(),
                    tenant_id.into_inner().into(),
                ],
            ))
            .await
            .map_err(db_err)?;

        let Some(row) = row else {
            // Still inside the current cycle; nothing to do.
            txn.commit().await.map_err(db_err)?;
            return Ok(false);
        };

        let balance = balance_from_row(&row).map_err(db_err)?;

        insert_transaction(
            &txn,
            tenant_id,
            allocation.monthly_credits,
            CreditOperation::Reset,
            "subscription",
            json!({ "tier": tier.as_str() }),
            &balance,
        )
        .await?;

        txn.commit().await.map_err(db_err)?;
        Ok(true)
    }

    /// Sets starting balances at account creation.
    ///
    /// Mirrors the reset allocation table but also zeroes the purchased
    /// pool. Trial tenants get a one-time allocation with a reset date far
    /// enough out that it never renews.
    ///
    /// # Errors
    ///
    /// `TenantNotFound` when the tenant row does not exist yet.
    pub async fn initialize(
        &self,
        tenant_id: TenantId,
        tier: SubscriptionTier,
    ) -> Result<(), CreditError> {
        let allocation = TierAllocation::for_tier(tier);
        let now = Utc::now();
        let reset_date = if allocation.resets_monthly {
            now.checked_add_months(Months::new(1))
        } else {
            now.checked_add_months(Months::new(12 * TRIAL_RESET_YEARS))
        }
        .unwrap_or(now);

        let txn = self.db.begin().await.map_err(db_err)?;

        let result = tenants::Entity::update_many()
            .col_expr(
                tenants::Column::MonthlyCredits,
                sea_orm::sea_query::Expr::value(allocation.monthly_credits),
            )
            .col_expr(
                tenants::Column::PurchasedCredits,
                sea_orm::sea_query::Expr::value(0),
            )
            .col_expr(
                tenants::Column::CreditsUsedThisMonth,
                sea_orm::sea_query::Expr::value(0),
            )
            .col_expr(
                tenants::Column::CreditsResetDate,
                sea_orm::sea_query::Expr::value(reset_date),
            )
            .col_expr(
                tenants::Column::UpdatedAt,
                sea_orm::sea_query::Expr::value(now),
            )
            .filter(tenants::Column::Id.eq(tenant_id.into_inner()))
            .exec(&txn)
            .await
            .map_err(db_err)?;

        if result.rows_affected == 0 {
            return Err(CreditError::TenantNotFound(tenant_id));
        }

        let balance = Balance {
            monthly: allocation.monthly_credits,
            purchased: 0,
            used_this_month: 0,
            reset_date,
        };

        insert_transaction(
            &txn,
            tenant_id,
            allocation.monthly_credits,
            CreditOperation::Reset,
            "subscription",
            json!({ "tier": tier.as_str(), "initial": true }),
            &balance,
        )
        .await?;

        txn.commit().await.map_err(db_err)?;
        Ok(())
    }

    /// Pages through a tenant's credit transaction history, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Database` on query failure.
    pub async fn history(
        &self,
        tenant_id: TenantId,
        page: &PageRequest,
    ) -> Result<(Vec<credit_transactions::Model>, u64), CreditError> {
        let query = credit_transactions::Entity::find()
            .filter(credit_transactions::Column::TenantId.eq(tenant_id.into_inner()));

        let total = query.clone().count(&self.db).await.map_err(db_err)?;

        let rows = query
            .order_by_desc(credit_transactions::Column::CreatedAt)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok((rows, total))
    }
}

fn db_err(e: DbErr) -> CreditError {
    CreditError::Database(e.to_string())
}

fn balance_from_tenant(tenant: &tenants::Model) -> Balance {
    Balance {
        monthly: tenant.monthly_credits,
        purchased: tenant.purchased_credits,
        used_this_month: tenant.credits_used_this_month,
        reset_date: tenant.credits_reset_date.with_timezone(&Utc),
    }
}

fn balance_from_row(row: &sea_orm::QueryResult) -> Result<Balance, DbErr> {
    Ok(Balance {
        monthly: row.try_get("", "monthly_credits")?,
        purchased: row.try_get("", "purchased_credits")?,
        used_this_month: row.try_get("", "credits_used_this_month")?,
        reset_date: row
            .try_get::<chrono::DateTime<chrono::FixedOffset>>("", "credits_reset_date")?
            .with_timezone(&Utc),
    })
}

/// Appends the ledger row for a balance change within the same transaction.
#[allow(clippy::cast_possible_truncation)]
async fn insert_transaction(
    txn: &DatabaseTransaction,
    tenant_id: TenantId,
    amount: i32,
    operation: CreditOperation,
    feature: &str,
    metadata: serde_json::Value,
    balance: &Balance,
) -> Result<(), CreditError> {
    let now = Utc::now();
    credit_transactions::ActiveModel {
        id: Set(Uuid::new_v4()),
        tenant_id: Set(tenant_id.into_inner()),
        amount: Set(amount),
        operation: Set(operation),
        feature: Set(feature.to_string()),
        metadata: Set(metadata),
        balance_after: Set(balance.total() as i32),
        created_at: Set(now.into()),
    }
    .insert(txn)
    .await
    .map_err(db_err)?;

    Ok(())
}
