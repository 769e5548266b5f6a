//! Store traits between the runner and the database layer.
//!
//! The traits are deliberately narrow: each exposes only what the dispatch
//! pipeline needs, so runner tests swap in mocks and integration wiring
//! uses the `Pg*` adapters over the real repositories.

use async_trait::async_trait;
use uuid::Uuid;

use velora_core::compliance::{Decision, MessageType};
use velora_core::credits::{Balance, CreditError};
use velora_core::notify::JobKind;
use velora_db::repositories::Candidate;
use velora_db::{CandidateRepository, ComplianceGate, CreditRepository};
use velora_shared::types::TenantId;

use crate::error::SchedulerError;

/// Candidate selection and sent-flag updates.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CandidateStore: Send + Sync {
    /// Candidates currently inside the job's time window.
    async fn find_candidates(&self, job: JobKind) -> Result<Vec<Candidate>, SchedulerError>;

    /// Claims the candidate's sent-flag; `false` means another run won.
    async fn mark_sent(&self, job: JobKind, candidate_id: Uuid) -> Result<bool, SchedulerError>;

    /// Clears all birthday flags for the yearly rollover.
    async fn reset_birthday_flags(&self) -> Result<u64, SchedulerError>;
}

/// Send-eligibility decisions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ComplianceStore: Send + Sync {
    /// Evaluates whether a message may go to this phone right now.
    ///
    /// Infallible: lookup failures are already resolved into a decision by
    /// the configured failure policy.
    async fn check(
        &self,
        phone: &str,
        tenant_id: TenantId,
        timezone: &str,
        message_type: MessageType,
    ) -> Decision;
}

/// Credit balance checks and charging.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CreditStore: Send + Sync {
    /// Whether the tenant can cover `required` credits.
    async fn has_credits(&self, tenant_id: TenantId, required: i32) -> Result<bool, CreditError>;

    /// Charges the tenant for a sent message.
    async fn deduct(
        &self,
        tenant_id: TenantId,
        amount: i32,
        feature: &str,
        metadata: serde_json::Value,
    ) -> Result<Balance, CreditError>;
}

/// [`CandidateStore`] over the Postgres repository.
#[derive(Debug, Clone)]
pub struct PgCandidateStore {
    repo: CandidateRepository,
}

impl PgCandidateStore {
    /// Wraps the repository.
    #[must_use]
    pub const fn new(repo: CandidateRepository) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl CandidateStore for PgCandidateStore {
    async fn find_candidates(&self, job: JobKind) -> Result<Vec<Candidate>, SchedulerError> {
        Ok(self.repo.find_candidates(job).await?)
    }

    async fn mark_sent(&self, job: JobKind, candidate_id: Uuid) -> Result<bool, SchedulerError> {
        Ok(self.repo.mark_sent(job, candidate_id).await?)
    }

    async fn reset_birthday_flags(&self) -> Result<u64, SchedulerError> {
        self.repo
            .reset_birthday_flags()
            .await
            .map_err(|e| SchedulerError::FlagRollover(e.to_string()))
    }
}

/// [`ComplianceStore`] over the gate.
#[derive(Debug, Clone)]
pub struct PgComplianceStore {
    gate: ComplianceGate,
}

impl PgComplianceStore {
    /// Wraps the gate.
    #[must_use]
    pub const fn new(gate: ComplianceGate) -> Self {
        Self { gate }
    }
}

#[async_trait]
impl ComplianceStore for PgComplianceStore {
    async fn check(
        &self,
        phone: &str,
        tenant_id: TenantId,
        timezone: &str,
        message_type: MessageType,
    ) -> Decision {
        self.gate
            .can_send(phone, tenant_id, timezone, message_type)
            .await
    }
}

/// [`CreditStore`] over the ledger repository.
#[derive(Debug, Clone)]
pub struct PgCreditStore {
    repo: CreditRepository,
}

impl PgCreditStore {
    /// Wraps the repository.
    #[must_use]
    pub const fn new(repo: CreditRepository) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl CreditStore for PgCreditStore {
    async fn has_credits(&self, tenant_id: TenantId, required: i32) -> Result<bool, CreditError> {
        self.repo.has_credits(tenant_id, required).await
    }

    async fn deduct(
        &self,
        tenant_id: TenantId,
        amount: i32,
        feature: &str,
        metadata: serde_json::Value,
    ) -> Result<Balance, CreditError> {
        self.repo.deduct(tenant_id, amount, feature, metadata).await
    }
}
