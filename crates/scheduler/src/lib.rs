//! Notification scheduler.
//!
//! This crate provides:
//! - The [`SmsProvider`] and [`AuditSink`] seams to the outside world
//! - Narrow store traits over the database repositories, so the dispatch
//!   pipeline is unit-testable without a database
//! - The [`JobRunner`] that executes one idempotent batch job end to end

pub mod audit;
pub mod error;
pub mod provider;
pub mod runner;
pub mod store;

pub use audit::{AuditEvent, AuditOutcome, AuditSink, TracingAuditSink};
pub use error::SchedulerError;
pub use provider::{ConsoleSmsProvider, ProviderError, SmsProvider};
pub use runner::JobRunner;
pub use store::{
    CandidateStore, ComplianceStore, CreditStore, PgCandidateStore, PgComplianceStore,
    PgCreditStore,
};
