//! Repository layer over the `SeaORM` entities.

mod candidate;
mod compliance;
mod credit;
mod tenant;

pub use candidate::{Candidate, CandidateRepository};
pub use compliance::{ComplianceGate, ComplianceRepository, RecordConsentInput};
pub use credit::CreditRepository;
pub use tenant::{CreateTenantInput, TenantRepository};
