//! Scheduler error types.

use thiserror::Error;

use velora_core::credits::CreditError;

/// Errors that abort a whole job run.
///
/// Per-candidate problems (provider failures, denials, races) are accounted
/// in the run summary instead of surfacing here; only failures that make the
/// run itself impossible become a `SchedulerError`.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Candidate selection failed; nothing was dispatched.
    #[error("candidate selection failed: {0}")]
    CandidateQuery(String),

    /// The birthday flag rollover failed; the run is aborted so no customer
    /// misses this year's greeting.
    #[error("birthday flag rollover failed: {0}")]
    FlagRollover(String),

    /// A ledger operation failed in a way that is not a per-candidate skip.
    #[error("credit ledger error: {0}")]
    Ledger(#[from] CreditError),
}

impl From<sea_orm::DbErr> for SchedulerError {
    fn from(e: sea_orm::DbErr) -> Self {
        Self::CandidateQuery(e.to_string())
    }
}
