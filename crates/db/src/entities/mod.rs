//! `SeaORM` entity definitions.

pub mod appointments;
pub mod credit_transactions;
pub mod customers;
pub mod sea_orm_active_enums;
pub mod sms_compliance_log;
pub mod sms_consent;
pub mod sms_opt_outs;
pub mod tenants;
