//! Notification job types and run accounting.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::compliance::MessageType;

/// The five notification job types.
///
/// Each is idempotent and re-run on a fixed external cadence. A candidate
/// can be messaged at most once per job type per eligibility window; the
/// per-record sent-flag is the sole idempotency guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Appointment reminder, one day out. Runs hourly.
    Reminder24h,
    /// Appointment reminder, two hours out. Runs every 30 minutes.
    Reminder2h,
    /// Birthday greeting. Runs daily.
    Birthday,
    /// Re-engagement for customers overdue for a visit. Runs weekly.
    ServiceReengagement,
    /// Follow-up after a missed appointment. Runs daily.
    NoShowFollowup,
}

impl JobKind {
    /// All job kinds, for spawning one loop per job.
    pub const ALL: [Self; 5] = [
        Self::Reminder24h,
        Self::Reminder2h,
        Self::Birthday,
        Self::ServiceReengagement,
        Self::NoShowFollowup,
    ];

    /// External trigger cadence for this job.
    #[must_use]
    pub const fn cadence(self) -> Duration {
        match self {
            Self::Reminder24h => Duration::from_secs(60 * 60),
            Self::Reminder2h => Duration::from_secs(30 * 60),
            Self::Birthday | Self::NoShowFollowup => Duration::from_secs(24 * 60 * 60),
            Self::ServiceReengagement => Duration::from_secs(7 * 24 * 60 * 60),
        }
    }

    /// Regulatory classification of the messages this job sends.
    ///
    /// Reminders and no-show follow-ups relate to a booked service and are
    /// transactional; birthday and re-engagement messages are marketing.
    #[must_use]
    pub const fn message_type(self) -> MessageType {
        match self {
            Self::Reminder24h | Self::Reminder2h | Self::NoShowFollowup => {
                MessageType::Transactional
            }
            Self::Birthday | Self::ServiceReengagement => MessageType::Promotional,
        }
    }

    /// Stable name used in logs and credit transaction metadata.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reminder24h => "reminder_24h",
            Self::Reminder2h => "reminder_2h",
            Self::Birthday => "birthday",
            Self::ServiceReengagement => "service_reengagement",
            Self::NoShowFollowup => "no_show_followup",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a candidate was passed over in a run.
///
/// Skips are outcomes, not errors; the candidate stays eligible for the
/// next run as long as it remains inside its time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No phone number on file. Logged at debug, never an error.
    MissingPhone,
    /// The compliance gate denied the send.
    ComplianceDenied(&'static str),
    /// The tenant cannot cover one credit. No backlog exists; if credits
    /// never arrive before the window closes, the message is lost.
    InsufficientCredits,
    /// Another scheduler instance already flipped the sent-flag.
    AlreadySent,
}

/// Accounting for one scheduler run of one job type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Candidates returned by the selection query.
    pub examined: u64,
    /// Messages sent and charged.
    pub sent: u64,
    /// Candidates skipped (any [`SkipReason`]).
    pub skipped: u64,
    /// Provider or ledger failures; flag left unset for retry next run.
    pub failed: u64,
}

impl RunSummary {
    /// Records a skip.
    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    /// Records a successful, charged send.
    pub fn record_sent(&mut self) {
        self.sent += 1;
    }

    /// Records a per-candidate failure.
    pub fn record_failure(&mut self) {
        self.failed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cadences() {
        assert_eq!(JobKind::Reminder24h.cadence(), Duration::from_secs(3600));
        assert_eq!(JobKind::Reminder2h.cadence(), Duration::from_secs(1800));
        assert_eq!(JobKind::Birthday.cadence(), Duration::from_secs(86_400));
        assert_eq!(
            JobKind::ServiceReengagement.cadence(),
            Duration::from_secs(604_800)
        );
        assert_eq!(
            JobKind::NoShowFollowup.cadence(),
            Duration::from_secs(86_400)
        );
    }

    #[test]
    fn test_message_classification() {
        assert_eq!(
            JobKind::Reminder24h.message_type(),
            MessageType::Transactional
        );
        assert_eq!(
            JobKind::Reminder2h.message_type(),
            MessageType::Transactional
        );
        assert_eq!(
            JobKind::NoShowFollowup.message_type(),
            MessageType::Transactional
        );
        assert_eq!(JobKind::Birthday.message_type(), MessageType::Promotional);
        assert_eq!(
            JobKind::ServiceReengagement.message_type(),
            MessageType::Promotional
        );
    }

    #[test]
    fn test_job_names_are_distinct() {
        let names: std::collections::HashSet<_> =
            JobKind::ALL.iter().map(|j| j.as_str()).collect();
        assert_eq!(names.len(), JobKind::ALL.len());
    }

    #[test]
    fn test_run_summary_accounting() {
        let mut summary = RunSummary::default();
        summary.examined = 3;
        summary.record_sent();
        summary.record_skip();
        summary.record_failure();
        assert_eq!(summary.sent, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
    }
}
