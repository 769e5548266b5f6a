//! The send-eligibility decision policy.
//!
//! The decision order is fixed and regulatory-sensitive:
//!
//! 1. opted out -> deny (blocks both message types)
//! 2. promotional without consent -> deny
//! 3. promotional during quiet hours -> deny
//! 4. malformed phone (fewer than 10 digits) -> deny
//! 5. otherwise allow
//!
//! Transactional messages bypass consent and quiet hours; only an opt-out
//! blocks them. Do not reorder these checks.

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Classification of an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Service messages tied to an existing relationship (reminders).
    Transactional,
    /// Marketing messages; require consent and honor quiet hours.
    Promotional,
}

/// Why a send was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The phone number has an active opt-out record.
    OptedOut,
    /// Promotional message without an active consent record.
    NoConsent,
    /// Promotional message during the recipient's quiet hours.
    QuietHours,
    /// Phone number has fewer than 10 digits.
    InvalidPhone,
    /// Consent lookup failed and the gate is configured FAIL_CLOSED.
    LookupFailed,
}

impl DenyReason {
    /// Stable string form written to the compliance log.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OptedOut => "opted_out",
            Self::NoConsent => "no_consent",
            Self::QuietHours => "quiet_hours",
            Self::InvalidPhone => "invalid_phone",
            Self::LookupFailed => "lookup_failed",
        }
    }
}

/// The outcome of a send-eligibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// Whether the message may be sent right now.
    pub allowed: bool,
    /// Reason string recorded in the compliance log. Denials always carry
    /// one; an allow carries one only on the fail-open path.
    pub reason: Option<&'static str>,
}

impl Decision {
    /// An unconditional allow.
    #[must_use]
    pub const fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    /// A denial with its reason.
    #[must_use]
    pub const fn deny(reason: DenyReason) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.as_str()),
        }
    }

    /// The fail-open allow issued when a lookup errors out.
    #[must_use]
    pub const fn allow_fail_open() -> Self {
        Self {
            allowed: true,
            reason: Some("lookup_failed_fail_open"),
        }
    }
}

/// Behavior when the consent/opt-out lookup itself fails.
///
/// `FailOpen` allows the send so business-critical transactional messages
/// survive an infrastructure outage; `FailClosed` denies it. Configured per
/// deployment, never hardcoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Lookup failures allow the send.
    FailOpen,
    /// Lookup failures deny the send.
    FailClosed,
}

impl FailurePolicy {
    /// Maps the boolean config flag onto the policy.
    #[must_use]
    pub const fn from_fail_open(fail_open: bool) -> Self {
        if fail_open {
            Self::FailOpen
        } else {
            Self::FailClosed
        }
    }

    /// The decision to issue when a lookup has failed.
    #[must_use]
    pub const fn decision_on_failure(self) -> Decision {
        match self {
            Self::FailOpen => Decision::allow_fail_open(),
            Self::FailClosed => Decision::deny(DenyReason::LookupFailed),
        }
    }
}

/// Consent state resolved from persistence for one phone + tenant pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComplianceStatus {
    /// An active opt-out record exists for the phone number.
    pub opted_out: bool,
    /// An active consent record exists for the phone + tenant pair.
    pub has_consent: bool,
}

/// A quiet-hours window in local time, `[start, end)` wrapping midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    /// First quiet hour (inclusive).
    pub start_hour: u32,
    /// First non-quiet hour (exclusive).
    pub end_hour: u32,
}

impl Default for QuietHours {
    /// The regulatory default: 9 PM to 8 AM local time.
    fn default() -> Self {
        Self {
            start_hour: 21,
            end_hour: 8,
        }
    }
}

impl QuietHours {
    /// Whether the given local hour falls inside the window.
    #[must_use]
    pub const fn contains(self, local_hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            local_hour >= self.start_hour && local_hour < self.end_hour
        } else {
            // Window wraps midnight, e.g. 21..8.
            local_hour >= self.start_hour || local_hour < self.end_hour
        }
    }

    /// Whether `now` falls inside the window in the given timezone.
    #[must_use]
    pub fn contains_at(self, tz: Tz, now: DateTime<Utc>) -> bool {
        self.contains(now.with_timezone(&tz).hour())
    }
}

/// Counts the digit characters in a phone number.
#[must_use]
pub fn digits_in(phone: &str) -> usize {
    phone.chars().filter(char::is_ascii_digit).count()
}

/// Evaluates the send-eligibility policy.
///
/// Pure function over already-resolved state; persistence lookups happen in
/// the caller. The check order is load-bearing - see the module docs.
#[must_use]
pub fn evaluate(
    status: ComplianceStatus,
    message_type: MessageType,
    quiet: QuietHours,
    local_hour: u32,
    phone: &str,
) -> Decision {
    if status.opted_out {
        return Decision::deny(DenyReason::OptedOut);
    }

    if message_type == MessageType::Promotional {
        if !status.has_consent {
            return Decision::deny(DenyReason::NoConsent);
        }
        if quiet.contains(local_hour) {
            return Decision::deny(DenyReason::QuietHours);
        }
    }

    if digits_in(phone) < 10 {
        return Decision::deny(DenyReason::InvalidPhone);
    }

    Decision::allow()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const VALID_PHONE: &str = "+15551234567";

    fn status(opted_out: bool, has_consent: bool) -> ComplianceStatus {
        ComplianceStatus {
            opted_out,
            has_consent,
        }
    }

    #[rstest]
    #[case(MessageType::Transactional)]
    #[case(MessageType::Promotional)]
    fn test_opt_out_blocks_both_message_types(#[case] message_type: MessageType) {
        let decision = evaluate(
            status(true, true),
            message_type,
            QuietHours::default(),
            12,
            VALID_PHONE,
        );
        assert!(!decision.allowed);
        assert_eq!(decision.reason, Some("opted_out"));
    }

    #[test]
    fn test_promotional_requires_consent() {
        let decision = evaluate(
            status(false, false),
            MessageType::Promotional,
            QuietHours::default(),
            12,
            VALID_PHONE,
        );
        assert!(!decision.allowed);
        assert_eq!(decision.reason, Some("no_consent"));
    }

    #[test]
    fn test_no_consent_reported_before_quiet_hours() {
        // 22:00 is quiet, but the consent check comes first in the order.
        let decision = evaluate(
            status(false, false),
            MessageType::Promotional,
            QuietHours::default(),
            22,
            VALID_PHONE,
        );
        assert_eq!(decision.reason, Some("no_consent"));
    }

    #[test]
    fn test_promotional_blocked_during_quiet_hours() {
        let decision = evaluate(
            status(false, true),
            MessageType::Promotional,
            QuietHours::default(),
            22,
            VALID_PHONE,
        );
        assert!(!decision.allowed);
        assert_eq!(decision.reason, Some("quiet_hours"));
    }

    #[test]
    fn test_transactional_bypasses_consent_and_quiet_hours() {
        let decision = evaluate(
            status(false, false),
            MessageType::Transactional,
            QuietHours::default(),
            22,
            VALID_PHONE,
        );
        assert!(decision.allowed);
        assert_eq!(decision.reason, None);
    }

    #[rstest]
    #[case("555-1234", false)]
    #[case("+1555123456", true)] // exactly 10 digits
    #[case("+15551234567", true)]
    #[case("(555) 123-4567", true)]
    #[case("", false)]
    fn test_phone_digit_threshold(#[case] phone: &str, #[case] expected_allowed: bool) {
        let decision = evaluate(
            status(false, true),
            MessageType::Transactional,
            QuietHours::default(),
            12,
            phone,
        );
        assert_eq!(decision.allowed, expected_allowed);
        if !expected_allowed {
            assert_eq!(decision.reason, Some("invalid_phone"));
        }
    }

    #[rstest]
    #[case(20, false)]
    #[case(21, true)]
    #[case(23, true)]
    #[case(0, true)]
    #[case(7, true)]
    #[case(8, false)]
    #[case(12, false)]
    fn test_quiet_hours_window_wraps_midnight(#[case] hour: u32, #[case] quiet: bool) {
        assert_eq!(QuietHours::default().contains(hour), quiet);
    }

    #[test]
    fn test_non_wrapping_quiet_window() {
        let window = QuietHours {
            start_hour: 1,
            end_hour: 5,
        };
        assert!(window.contains(1));
        assert!(window.contains(4));
        assert!(!window.contains(5));
        assert!(!window.contains(23));
    }

    #[test]
    fn test_quiet_hours_respect_timezone() {
        use chrono::TimeZone;

        // 15:00 UTC is midnight in Tokyo (quiet) and 10:00 in New York (not).
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 15, 0, 0).unwrap();
        let window = QuietHours::default();
        assert!(window.contains_at(chrono_tz::Asia::Tokyo, now));
        assert!(!window.contains_at(chrono_tz::America::New_York, now));
    }

    #[test]
    fn test_failure_policy_decisions() {
        let open = FailurePolicy::from_fail_open(true).decision_on_failure();
        assert!(open.allowed);
        assert_eq!(open.reason, Some("lookup_failed_fail_open"));

        let closed = FailurePolicy::from_fail_open(false).decision_on_failure();
        assert!(!closed.allowed);
        assert_eq!(closed.reason, Some("lookup_failed"));
    }

    #[test]
    fn test_digits_in_ignores_formatting() {
        assert_eq!(digits_in("+1 (555) 123-4567"), 11);
        assert_eq!(digits_in("no digits"), 0);
    }
}
