//! The per-job dispatch pipeline.

use std::time::Duration;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use serde_json::json;
use tracing::{debug, error, info, warn};

use velora_core::notify::{render, JobKind, MessageContext, RunSummary, SkipReason};
use velora_db::repositories::Candidate;
use velora_shared::types::TenantId;

use crate::audit::{AuditEvent, AuditOutcome, AuditSink};
use crate::error::SchedulerError;
use crate::provider::SmsProvider;
use crate::store::{CandidateStore, ComplianceStore, CreditStore};

/// Cost of one notification message.
const CREDITS_PER_MESSAGE: i32 = 1;

/// Executes one batch job end to end.
///
/// Candidates flow through a fixed pipeline: phone check, compliance gate,
/// balance check, provider send under a timeout, then charge and flag flip.
/// A failure on one candidate never aborts the rest of the run; only a
/// failed candidate selection or a database error on the flag flip does,
/// since the latter means persistence is gone mid-run.
pub struct JobRunner<C, G, L, P, A> {
    candidates: C,
    compliance: G,
    credits: L,
    provider: P,
    audit: A,
    send_timeout: Duration,
}

/// Terminal state of one candidate within a run.
enum Outcome {
    Sent { provider_message_id: String },
    Skipped(SkipReason),
    Failed(String),
}

impl<C, G, L, P, A> JobRunner<C, G, L, P, A>
where
    C: CandidateStore,
    G: ComplianceStore,
    L: CreditStore,
    P: SmsProvider,
    A: AuditSink,
{
    /// Creates a runner over the given stores and seams.
    pub const fn new(
        candidates: C,
        compliance: G,
        credits: L,
        provider: P,
        audit: A,
        send_timeout: Duration,
    ) -> Self {
        Self {
            candidates,
            compliance,
            credits,
            provider,
            audit,
            send_timeout,
        }
    }

    /// Runs one job cycle and returns its accounting.
    ///
    /// # Errors
    ///
    /// Returns an error when candidate selection, the birthday flag
    /// rollover, or a sent-flag update fails; other per-candidate problems
    /// are counted, not raised.
    pub async fn run(&self, job: JobKind) -> Result<RunSummary, SchedulerError> {
        if needs_birthday_rollover(job, Utc::now().date_naive()) {
            let cleared = self.candidates.reset_birthday_flags().await?;
            info!(cleared, "cleared birthday flags for the new year");
        }

        let candidates = self.candidates.find_candidates(job).await?;
        let mut summary = RunSummary {
            examined: candidates.len() as u64,
            ..RunSummary::default()
        };

        for candidate in candidates {
            let outcome = match self.dispatch(job, &candidate).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.audit
                        .record(audit_event(job, &candidate, Outcome::Failed(e.to_string())))
                        .await;
                    error!(%job, error = %e, "persistence lost mid-run, aborting remaining candidates");
                    return Err(e);
                }
            };
            match &outcome {
                Outcome::Sent { .. } => summary.record_sent(),
                Outcome::Skipped(_) => summary.record_skip(),
                Outcome::Failed(_) => summary.record_failure(),
            }
            self.audit
                .record(audit_event(job, &candidate, outcome))
                .await;
        }

        info!(
            %job,
            examined = summary.examined,
            sent = summary.sent,
            skipped = summary.skipped,
            failed = summary.failed,
            "job run complete"
        );
        Ok(summary)
    }

    async fn dispatch(
        &self,
        job: JobKind,
        candidate: &Candidate,
    ) -> Result<Outcome, SchedulerError> {
        let tenant_id = TenantId::from_uuid(candidate.tenant_id);

        let Some(phone) = candidate.phone.as_deref() else {
            debug!(%job, candidate_id = %candidate.id, "no phone on file");
            return Ok(Outcome::Skipped(SkipReason::MissingPhone));
        };

        let decision = self
            .compliance
            .check(phone, tenant_id, &candidate.timezone, job.message_type())
            .await;
        if !decision.allowed {
            let reason = decision.reason.unwrap_or("denied");
            debug!(%job, candidate_id = %candidate.id, reason, "compliance denied");
            return Ok(Outcome::Skipped(SkipReason::ComplianceDenied(reason)));
        }

        match self.credits.has_credits(tenant_id, CREDITS_PER_MESSAGE).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(%job, %tenant_id, "tenant out of credits");
                return Ok(Outcome::Skipped(SkipReason::InsufficientCredits));
            }
            Err(e) => return Ok(Outcome::Failed(e.to_string())),
        }

        let body = render(job, &message_context(candidate));
        let sent = tokio::time::timeout(self.send_timeout, self.provider.send(phone, &body)).await;
        let provider_message_id = match sent {
            Ok(Ok(id)) => id,
            Ok(Err(e)) => {
                warn!(%job, candidate_id = %candidate.id, error = %e, "provider send failed");
                return Ok(Outcome::Failed(e.to_string()));
            }
            Err(_) => {
                warn!(%job, candidate_id = %candidate.id, "provider send timed out");
                return Ok(Outcome::Failed(format!(
                    "provider timed out after {}s",
                    self.send_timeout.as_secs()
                )));
            }
        };

        // The message is out; the charge and the flag flip must both be
        // attempted even if the other fails.
        if let Err(e) = self
            .credits
            .deduct(
                tenant_id,
                CREDITS_PER_MESSAGE,
                job.as_str(),
                json!({ "candidate_id": candidate.id, "phone": phone }),
            )
            .await
        {
            error!(%job, %tenant_id, error = %e, "message sent but charge failed");
        }

        if self.candidates.mark_sent(job, candidate.id).await? {
            Ok(Outcome::Sent {
                provider_message_id,
            })
        } else {
            // A concurrent run flipped the flag between selection and
            // now; this customer received a duplicate message.
            warn!(%job, candidate_id = %candidate.id, "sent-flag race lost, duplicate dispatch");
            Ok(Outcome::Skipped(SkipReason::AlreadySent))
        }
    }
}

/// The birthday job clears last year's flags on January 1 before selecting.
fn needs_birthday_rollover(job: JobKind, today: NaiveDate) -> bool {
    job == JobKind::Birthday && today.month() == 1 && today.day() == 1
}

fn message_context(candidate: &Candidate) -> MessageContext {
    MessageContext {
        customer_name: candidate.customer_name.clone(),
        business_name: candidate.business_name.clone(),
        service_name: candidate.service_name.clone(),
        appointment_time: candidate
            .starts_at
            .map(|t| format_local(t, &candidate.timezone)),
    }
}

/// Formats the appointment time in the tenant's local timezone.
fn format_local(starts_at: DateTime<FixedOffset>, timezone: &str) -> String {
    let tz: chrono_tz::Tz = timezone.parse().unwrap_or(chrono_tz::UTC);
    starts_at
        .with_timezone(&tz)
        .format("%b %-d at %-I:%M %p")
        .to_string()
}

fn audit_event(job: JobKind, candidate: &Candidate, outcome: Outcome) -> AuditEvent {
    let outcome = match outcome {
        Outcome::Sent {
            provider_message_id,
        } => AuditOutcome::Sent {
            provider_message_id,
        },
        Outcome::Skipped(reason) => AuditOutcome::Skipped {
            reason: skip_reason_name(reason).to_string(),
        },
        Outcome::Failed(error) => AuditOutcome::Failed { error },
    };
    AuditEvent {
        job,
        tenant_id: candidate.tenant_id,
        candidate_id: candidate.id,
        phone: candidate.phone.clone(),
        outcome,
    }
}

fn skip_reason_name(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::MissingPhone => "missing_phone",
        SkipReason::ComplianceDenied(name) => name,
        SkipReason::InsufficientCredits => "insufficient_credits",
        SkipReason::AlreadySent => "already_sent",
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use mockall::predicate::eq;
    use uuid::Uuid;

    use velora_core::compliance::{Decision, DenyReason};
    use velora_core::credits::{Balance, CreditError};

    use super::*;
    use crate::audit::MockAuditSink;
    use crate::provider::{MockSmsProvider, ProviderError};
    use crate::store::{MockCandidateStore, MockComplianceStore, MockCreditStore};

    fn candidate(phone: Option<&str>) -> Candidate {
        Candidate {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            customer_name: "Dana".to_string(),
            business_name: "Glow Salon".to_string(),
            timezone: "America/New_York".to_string(),
            phone: phone.map(String::from),
            service_name: Some("Balayage".to_string()),
            starts_at: Some((Utc::now() + ChronoDuration::hours(24)).fixed_offset()),
        }
    }

    fn balance() -> Balance {
        Balance {
            monthly: 499,
            purchased: 0,
            used_this_month: 1,
            reset_date: Utc::now(),
        }
    }

    fn quiet_audit() -> MockAuditSink {
        let mut audit = MockAuditSink::new();
        audit.expect_record().returning(|_| ());
        audit
    }

    fn allow_all_compliance() -> MockComplianceStore {
        let mut compliance = MockComplianceStore::new();
        compliance
            .expect_check()
            .returning(|_, _, _, _| Decision::allow());
        compliance
    }

    fn funded_credits() -> MockCreditStore {
        let mut credits = MockCreditStore::new();
        credits.expect_has_credits().returning(|_, _| Ok(true));
        credits.expect_deduct().returning(|_, _, _, _| Ok(balance()));
        credits
    }

    #[tokio::test]
    async fn test_successful_send_charges_one_credit_and_flips_flag() {
        let cand = candidate(Some("+15551234567"));
        let cand_id = cand.id;

        let mut candidates = MockCandidateStore::new();
        candidates
            .expect_find_candidates()
            .returning(move |_| Ok(vec![cand.clone()]));
        candidates
            .expect_mark_sent()
            .with(eq(JobKind::Reminder24h), eq(cand_id))
            .times(1)
            .returning(|_, _| Ok(true));

        let mut credits = MockCreditStore::new();
        credits.expect_has_credits().returning(|_, _| Ok(true));
        credits
            .expect_deduct()
            .withf(|_, amount, feature, _| *amount == 1 && feature == "reminder_24h")
            .times(1)
            .returning(|_, _, _, _| Ok(balance()));

        let mut provider = MockSmsProvider::new();
        provider
            .expect_send()
            .withf(|phone, body| phone == "+15551234567" && body.contains("Dana"))
            .times(1)
            .returning(|_, _| Ok("msg-1".to_string()));

        let runner = JobRunner::new(
            candidates,
            allow_all_compliance(),
            credits,
            provider,
            quiet_audit(),
            Duration::from_secs(5),
        );

        let summary = runner.run(JobKind::Reminder24h).await.unwrap();
        assert_eq!(summary.examined, 1);
        assert_eq!(summary.sent, 1);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    async fn test_missing_phone_skips_without_touching_provider() {
        let mut candidates = MockCandidateStore::new();
        let cand = candidate(None);
        candidates
            .expect_find_candidates()
            .returning(move |_| Ok(vec![cand.clone()]));
        candidates.expect_mark_sent().times(0);

        let mut provider = MockSmsProvider::new();
        provider.expect_send().times(0);

        let mut compliance = MockComplianceStore::new();
        compliance.expect_check().times(0);

        let runner = JobRunner::new(
            candidates,
            compliance,
            funded_credits(),
            provider,
            quiet_audit(),
            Duration::from_secs(5),
        );

        let summary = runner.run(JobKind::Reminder24h).await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.sent, 0);
    }

    #[tokio::test]
    async fn test_compliance_denial_skips_without_sending_or_charging() {
        let mut candidates = MockCandidateStore::new();
        let cand = candidate(Some("+15551234567"));
        candidates
            .expect_find_candidates()
            .returning(move |_| Ok(vec![cand.clone()]));
        candidates.expect_mark_sent().times(0);

        let mut compliance = MockComplianceStore::new();
        compliance
            .expect_check()
            .returning(|_, _, _, _| Decision::deny(DenyReason::OptedOut));

        let mut credits = MockCreditStore::new();
        credits.expect_has_credits().times(0);
        credits.expect_deduct().times(0);

        let mut provider = MockSmsProvider::new();
        provider.expect_send().times(0);

        let mut audit = MockAuditSink::new();
        audit
            .expect_record()
            .withf(|e| {
                matches!(
                    &e.outcome,
                    AuditOutcome::Skipped { reason } if reason == "opted_out"
                )
            })
            .times(1)
            .returning(|_| ());

        let runner = JobRunner::new(
            candidates,
            compliance,
            credits,
            provider,
            audit,
            Duration::from_secs(5),
        );

        let summary = runner.run(JobKind::Birthday).await.unwrap();
        assert_eq!(summary.skipped, 1);
    }

    #[tokio::test]
    async fn test_insufficient_credits_skips_and_leaves_flag_unset() {
        let mut candidates = MockCandidateStore::new();
        let cand = candidate(Some("+15551234567"));
        candidates
            .expect_find_candidates()
            .returning(move |_| Ok(vec![cand.clone()]));
        candidates.expect_mark_sent().times(0);

        let mut credits = MockCreditStore::new();
        credits.expect_has_credits().returning(|_, _| Ok(false));
        credits.expect_deduct().times(0);

        let mut provider = MockSmsProvider::new();
        provider.expect_send().times(0);

        let runner = JobRunner::new(
            candidates,
            allow_all_compliance(),
            credits,
            provider,
            quiet_audit(),
            Duration::from_secs(5),
        );

        let summary = runner.run(JobKind::Reminder2h).await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    async fn test_provider_rejection_counts_failed_and_leaves_flag_unset() {
        let mut candidates = MockCandidateStore::new();
        let cand = candidate(Some("+15551234567"));
        candidates
            .expect_find_candidates()
            .returning(move |_| Ok(vec![cand.clone()]));
        candidates.expect_mark_sent().times(0);

        let mut credits = MockCreditStore::new();
        credits.expect_has_credits().returning(|_, _| Ok(true));
        credits.expect_deduct().times(0);

        let mut provider = MockSmsProvider::new();
        provider
            .expect_send()
            .returning(|_, _| Err(ProviderError::Rejected("unroutable".to_string())));

        let runner = JobRunner::new(
            candidates,
            allow_all_compliance(),
            credits,
            provider,
            quiet_audit(),
            Duration::from_secs(5),
        );

        let summary = runner.run(JobKind::Reminder24h).await.unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.sent, 0);
    }

    /// Provider that never completes, for timeout coverage.
    struct StalledProvider;

    #[async_trait]
    impl SmsProvider for StalledProvider {
        async fn send(&self, _phone: &str, _body: &str) -> Result<String, ProviderError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_provider_timeout_counts_failed() {
        let mut candidates = MockCandidateStore::new();
        let cand = candidate(Some("+15551234567"));
        candidates
            .expect_find_candidates()
            .returning(move |_| Ok(vec![cand.clone()]));
        candidates.expect_mark_sent().times(0);

        let mut credits = MockCreditStore::new();
        credits.expect_has_credits().returning(|_, _| Ok(true));
        credits.expect_deduct().times(0);

        let runner = JobRunner::new(
            candidates,
            allow_all_compliance(),
            credits,
            StalledProvider,
            quiet_audit(),
            Duration::from_millis(10),
        );

        let summary = runner.run(JobKind::Reminder24h).await.unwrap();
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn test_lost_flag_race_records_already_sent() {
        let mut candidates = MockCandidateStore::new();
        let cand = candidate(Some("+15551234567"));
        candidates
            .expect_find_candidates()
            .returning(move |_| Ok(vec![cand.clone()]));
        candidates.expect_mark_sent().returning(|_, _| Ok(false));

        let mut provider = MockSmsProvider::new();
        provider
            .expect_send()
            .returning(|_, _| Ok("msg-2".to_string()));

        let mut audit = MockAuditSink::new();
        audit
            .expect_record()
            .withf(|e| {
                matches!(
                    &e.outcome,
                    AuditOutcome::Skipped { reason } if reason == "already_sent"
                )
            })
            .times(1)
            .returning(|_| ());

        let runner = JobRunner::new(
            candidates,
            allow_all_compliance(),
            funded_credits(),
            provider,
            audit,
            Duration::from_secs(5),
        );

        let summary = runner.run(JobKind::NoShowFollowup).await.unwrap();
        assert_eq!(summary.skipped, 1);
    }

    #[tokio::test]
    async fn test_charge_failure_after_send_still_flips_flag() {
        let mut candidates = MockCandidateStore::new();
        let cand = candidate(Some("+15551234567"));
        candidates
            .expect_find_candidates()
            .returning(move |_| Ok(vec![cand.clone()]));
        candidates
            .expect_mark_sent()
            .times(1)
            .returning(|_, _| Ok(true));

        let mut credits = MockCreditStore::new();
        credits.expect_has_credits().returning(|_, _| Ok(true));
        credits
            .expect_deduct()
            .returning(|_, _, _, _| Err(CreditError::Database("connection reset".to_string())));

        let mut provider = MockSmsProvider::new();
        provider
            .expect_send()
            .returning(|_, _| Ok("msg-3".to_string()));

        let runner = JobRunner::new(
            candidates,
            allow_all_compliance(),
            credits,
            provider,
            quiet_audit(),
            Duration::from_secs(5),
        );

        let summary = runner.run(JobKind::Reminder24h).await.unwrap();
        assert_eq!(summary.sent, 1);
    }

    #[tokio::test]
    async fn test_candidate_query_error_aborts_the_run() {
        let mut candidates = MockCandidateStore::new();
        candidates
            .expect_find_candidates()
            .returning(|_| Err(SchedulerError::CandidateQuery("boom".to_string())));

        let runner = JobRunner::new(
            candidates,
            allow_all_compliance(),
            funded_credits(),
            MockSmsProvider::new(),
            quiet_audit(),
            Duration::from_secs(5),
        );

        assert!(runner.run(JobKind::Reminder24h).await.is_err());
    }

    #[tokio::test]
    async fn test_flag_update_failure_aborts_remaining_candidates() {
        let first = candidate(Some("+15551234567"));
        let second = candidate(Some("+15557654321"));

        let mut candidates = MockCandidateStore::new();
        candidates
            .expect_find_candidates()
            .returning(move |_| Ok(vec![first.clone(), second.clone()]));
        candidates
            .expect_mark_sent()
            .times(1)
            .returning(|_, _| Err(SchedulerError::CandidateQuery("connection closed".to_string())));

        let mut provider = MockSmsProvider::new();
        provider
            .expect_send()
            .times(1)
            .returning(|_, _| Ok("msg-5".to_string()));

        let runner = JobRunner::new(
            candidates,
            allow_all_compliance(),
            funded_credits(),
            provider,
            quiet_audit(),
            Duration::from_secs(5),
        );

        assert!(runner.run(JobKind::Reminder24h).await.is_err());
    }

    #[tokio::test]
    async fn test_one_bad_candidate_does_not_abort_the_rest() {
        let good = candidate(Some("+15551234567"));
        let no_phone = candidate(None);
        let good_id = good.id;

        let mut candidates = MockCandidateStore::new();
        candidates
            .expect_find_candidates()
            .returning(move |_| Ok(vec![no_phone.clone(), good.clone()]));
        candidates
            .expect_mark_sent()
            .with(eq(JobKind::Reminder24h), eq(good_id))
            .times(1)
            .returning(|_, _| Ok(true));

        let mut provider = MockSmsProvider::new();
        provider
            .expect_send()
            .times(1)
            .returning(|_, _| Ok("msg-4".to_string()));

        let runner = JobRunner::new(
            candidates,
            allow_all_compliance(),
            funded_credits(),
            provider,
            quiet_audit(),
            Duration::from_secs(5),
        );

        let summary = runner.run(JobKind::Reminder24h).await.unwrap();
        assert_eq!(summary.examined, 2);
        assert_eq!(summary.sent, 1);
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn test_birthday_rollover_only_on_january_first() {
        let jan1 = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let jan2 = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        assert!(needs_birthday_rollover(JobKind::Birthday, jan1));
        assert!(!needs_birthday_rollover(JobKind::Birthday, jan2));
        assert!(!needs_birthday_rollover(JobKind::Reminder24h, jan1));
    }
}
