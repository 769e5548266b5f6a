//! Send-eligibility decision rules for outbound SMS.
//!
//! This module implements the pure compliance policy:
//! - The fixed-order eligibility check (opt-out, consent, quiet hours, phone)
//! - Quiet-hours windows evaluated in the recipient's local timezone
//! - The configurable failure policy for lookup outages
//! - Error types for compliance operations

pub mod error;
pub mod policy;

pub use error::ComplianceError;
pub use policy::{
    digits_in, evaluate, ComplianceStatus, Decision, DenyReason, FailurePolicy, MessageType,
    QuietHours,
};
