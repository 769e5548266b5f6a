//! Audit trail for dispatch decisions.
//!
//! The audit sink observes every per-candidate outcome. Its contract is
//! that recording never blocks or fails the pipeline; implementations
//! swallow their own errors and log locally instead.

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use velora_core::notify::JobKind;

/// What happened to one candidate in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditOutcome {
    /// Sent and charged.
    Sent {
        /// Provider-assigned message ID.
        provider_message_id: String,
    },
    /// Passed over; the stable skip reason name.
    Skipped {
        /// e.g. `missing_phone`, `opted_out`, `insufficient_credits`.
        reason: String,
    },
    /// Dispatch was attempted and failed; eligible again next run.
    Failed {
        /// Provider or ledger error description.
        error: String,
    },
}

/// One audit record.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// The job that examined the candidate.
    pub job: JobKind,
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Appointment or customer ID.
    pub candidate_id: Uuid,
    /// Target phone, when one was on file.
    pub phone: Option<String>,
    /// The outcome.
    pub outcome: AuditOutcome,
}

/// Sink for audit events.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Records one event. Must not block the pipeline; failures stay
    /// inside the implementation.
    async fn record(&self, event: AuditEvent);
}

/// Audit sink that emits structured log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) {
        info!(
            job = %event.job,
            tenant_id = %event.tenant_id,
            candidate_id = %event.candidate_id,
            phone = event.phone.as_deref(),
            outcome = ?event.outcome,
            "dispatch audit"
        );
    }
}
