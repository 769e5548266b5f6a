//! Common domain types.

pub mod id;
pub mod pagination;

pub use id::{
    AppointmentId, ConsentId, CreditTransactionId, CustomerId, OptOutId, TenantId,
};
pub use pagination::{PageMeta, PageRequest, PageResponse};
