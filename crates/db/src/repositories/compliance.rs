//! Consent, opt-out, and compliance-log persistence, plus the send
//! eligibility gate that combines them with the pure decision policy.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, Set, TransactionTrait,
};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use velora_core::compliance::{
    evaluate, ComplianceError, ComplianceStatus, Decision, FailurePolicy, MessageType, QuietHours,
};
use velora_shared::types::TenantId;

use crate::entities::{sms_compliance_log, sms_consent, sms_opt_outs};

/// Input for recording a new consent.
#[derive(Debug, Clone)]
pub struct RecordConsentInput {
    /// Phone number in whatever format the tenant captured.
    pub phone: String,
    /// Tenant the consent is scoped to.
    pub tenant_id: TenantId,
    /// Consent category, e.g. `promotional`.
    pub consent_type: String,
    /// Capture method, e.g. `web_form`, `keyword`.
    pub method: String,
    /// Purposes covered by this consent.
    pub purposes: Vec<String>,
}

/// Repository for consent and opt-out records.
#[derive(Debug, Clone)]
pub struct ComplianceRepository {
    db: DatabaseConnection,
}

impl ComplianceRepository {
    /// Creates a new compliance repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// True if an opt-out record exists for the phone number.
    ///
    /// # Errors
    ///
    /// Returns `LookupFailed` on query failure.
    pub async fn is_opted_out(&self, phone: &str) -> Result<bool, ComplianceError> {
        let count = sms_opt_outs::Entity::find()
            .filter(sms_opt_outs::Column::Phone.eq(phone))
            .count(&self.db)
            .await
            .map_err(lookup_err)?;
        Ok(count > 0)
    }

    /// True if an active consent record exists for the phone + tenant pair.
    ///
    /// # Errors
    ///
    /// Returns `LookupFailed` on query failure.
    pub async fn has_consent(
        &self,
        phone: &str,
        tenant_id: TenantId,
    ) -> Result<bool, ComplianceError> {
        let count = sms_consent::Entity::find()
            .filter(sms_consent::Column::Phone.eq(phone))
            .filter(sms_consent::Column::TenantId.eq(tenant_id.into_inner()))
            .filter(sms_consent::Column::IsActive.eq(true))
            .count(&self.db)
            .await
            .map_err(lookup_err)?;
        Ok(count > 0)
    }

    /// Resolves both lookups for the gate in one call.
    ///
    /// # Errors
    ///
    /// Returns `LookupFailed` on query failure.
    pub async fn status(
        &self,
        phone: &str,
        tenant_id: TenantId,
    ) -> Result<ComplianceStatus, ComplianceError> {
        Ok(ComplianceStatus {
            opted_out: self.is_opted_out(phone).await?,
            has_consent: self.has_consent(phone, tenant_id).await?,
        })
    }

    /// Appends a new active consent record.
    ///
    /// Overlapping consents for the same phone + tenant are not
    /// deduplicated; each capture event stands on its own.
    ///
    /// # Errors
    ///
    /// Returns `Database` on insert failure.
    pub async fn record_consent(
        &self,
        input: RecordConsentInput,
    ) -> Result<sms_consent::Model, ComplianceError> {
        let now = Utc::now();
        sms_consent::ActiveModel {
            id: Set(Uuid::new_v4()),
            phone: Set(input.phone),
            tenant_id: Set(input.tenant_id.into_inner()),
            consent_type: Set(input.consent_type),
            method: Set(input.method),
            purposes: Set(json!(input.purposes)),
            consented_at: Set(now.into()),
            is_active: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&self.db)
        .await
        .map_err(db_error)
    }

    /// Processes a STOP: records the opt-out and deactivates every consent
    /// for that phone across all tenants.
    ///
    /// Opt-out scope is global by phone number, not per tenant. A repeated
    /// STOP from a phone already opted out is a no-op for the opt-out row.
    ///
    /// # Errors
    ///
    /// Returns `Database` on write failure.
    pub async fn process_opt_out(
        &self,
        phone: &str,
        reason: Option<&str>,
    ) -> Result<(), ComplianceError> {
        let txn = self.db.begin().await.map_err(db_error)?;
        let now = Utc::now();

        let already = sms_opt_outs::Entity::find()
            .filter(sms_opt_outs::Column::Phone.eq(phone))
            .one(&txn)
            .await
            .map_err(db_error)?;

        if already.is_none() {
            sms_opt_outs::ActiveModel {
                id: Set(Uuid::new_v4()),
                phone: Set(phone.to_string()),
                opted_out_at: Set(now.into()),
                reason: Set(reason.map(String::from)),
            }
            .insert(&txn)
            .await
            .map_err(db_error)?;
        }

        sms_consent::Entity::update_many()
            .col_expr(
                sms_consent::Column::IsActive,
                sea_orm::sea_query::Expr::value(false),
            )
            .col_expr(
                sms_consent::Column::UpdatedAt,
                sea_orm::sea_query::Expr::value(now),
            )
            .filter(sms_consent::Column::Phone.eq(phone))
            .filter(sms_consent::Column::IsActive.eq(true))
            .exec(&txn)
            .await
            .map_err(db_error)?;

        txn.commit().await.map_err(db_error)?;
        Ok(())
    }

    /// Processes a START: deletes the opt-out record and reactivates the
    /// consents scoped to the given tenant.
    ///
    /// When the phone never had a consent for this tenant, a fresh keyword
    /// consent is recorded so the opt-in is not silently lost.
    ///
    /// # Errors
    ///
    /// Returns `Database` on write failure.
    pub async fn process_opt_in(
        &self,
        phone: &str,
        tenant_id: TenantId,
        method: &str,
    ) -> Result<(), ComplianceError> {
        let txn = self.db.begin().await.map_err(db_error)?;
        let now = Utc::now();

        sms_opt_outs::Entity::delete_many()
            .filter(sms_opt_outs::Column::Phone.eq(phone))
            .exec(&txn)
            .await
            .map_err(db_error)?;

        let reactivated = sms_consent::Entity::update_many()
            .col_expr(
                sms_consent::Column::IsActive,
                sea_orm::sea_query::Expr::value(true),
            )
            .col_expr(
                sms_consent::Column::UpdatedAt,
                sea_orm::sea_query::Expr::value(now),
            )
            .filter(sms_consent::Column::Phone.eq(phone))
            .filter(sms_consent::Column::TenantId.eq(tenant_id.into_inner()))
            .exec(&txn)
            .await
            .map_err(db_error)?;

        if reactivated.rows_affected == 0 {
            sms_consent::ActiveModel {
                id: Set(Uuid::new_v4()),
                phone: Set(phone.to_string()),
                tenant_id: Set(tenant_id.into_inner()),
                consent_type: Set("promotional".to_string()),
                method: Set(method.to_string()),
                purposes: Set(json!(["promotional"])),
                consented_at: Set(now.into()),
                is_active: Set(true),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            }
            .insert(&txn)
            .await
            .map_err(db_error)?;
        }

        txn.commit().await.map_err(db_error)?;
        Ok(())
    }

    /// Appends an immutable compliance-log entry for one decision.
    ///
    /// # Errors
    ///
    /// Returns `Database` on insert failure.
    pub async fn log_check(
        &self,
        phone: &str,
        tenant_id: TenantId,
        message_type: MessageType,
        decision: Decision,
    ) -> Result<(), ComplianceError> {
        let message_type = match message_type {
            MessageType::Transactional => "transactional",
            MessageType::Promotional => "promotional",
        };

        sms_compliance_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            phone: Set(phone.to_string()),
            tenant_id: Set(tenant_id.into_inner()),
            allowed: Set(decision.allowed),
            reason: Set(decision.reason.map(String::from)),
            message_type: Set(message_type.to_string()),
            checked_at: Set(Utc::now().into()),
        }
        .insert(&self.db)
        .await
        .map_err(db_error)?;

        Ok(())
    }
}

fn lookup_err(e: DbErr) -> ComplianceError {
    ComplianceError::LookupFailed(e.to_string())
}

fn db_error(e: DbErr) -> ComplianceError {
    ComplianceError::Database(e.to_string())
}

/// The compliance gate: decides whether a message to a phone number may
/// legally be sent right now.
#[derive(Debug, Clone)]
pub struct ComplianceGate {
    repo: ComplianceRepository,
    policy: FailurePolicy,
    quiet: QuietHours,
}

impl ComplianceGate {
    /// Creates a gate over the repository with the given failure policy and
    /// quiet-hours window.
    #[must_use]
    pub const fn new(repo: ComplianceRepository, policy: FailurePolicy, quiet: QuietHours) -> Self {
        Self {
            repo,
            policy,
            quiet,
        }
    }

    /// Evaluates send eligibility and appends the decision to the
    /// compliance log.
    ///
    /// Lookup failures resolve through the configured [`FailurePolicy`]
    /// instead of propagating, so a storage outage cannot silently drop
    /// transactional messages when the deployment runs fail-open. Log
    /// append failures are warned about and swallowed; the decision stands.
    pub async fn can_send(
        &self,
        phone: &str,
        tenant_id: TenantId,
        timezone: &str,
        message_type: MessageType,
    ) -> Decision {
        let decision = match self.repo.status(phone, tenant_id).await {
            Ok(status) => {
                let local_hour = current_local_hour(timezone);
                evaluate(status, message_type, self.quiet, local_hour, phone)
            }
            Err(e) => {
                warn!(phone, %tenant_id, error = %e, policy = ?self.policy, "consent lookup failed");
                self.policy.decision_on_failure()
            }
        };

        if let Err(e) = self
            .repo
            .log_check(phone, tenant_id, message_type, decision)
            .await
        {
            // The compliance log is an audit sink; it never blocks a send.
            warn!(phone, %tenant_id, error = %e, "failed to append compliance log entry");
        }

        decision
    }
}

/// Resolves the current hour in the tenant's timezone.
///
/// Unknown timezone names fall back to UTC rather than failing the batch;
/// tenant timezones are validated at onboarding.
fn current_local_hour(timezone: &str) -> u32 {
    use chrono::Timelike;

    let tz: chrono_tz::Tz = timezone.parse().unwrap_or_else(|_| {
        warn!(timezone, "unknown tenant timezone, falling back to UTC");
        chrono_tz::UTC
    });
    Utc::now().with_timezone(&tz).hour()
}
