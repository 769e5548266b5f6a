//! `SeaORM` Entity for the sms_compliance_log table.
//!
//! Append-only record of every send-eligibility decision, for compliance
//! review. Never updated or deleted.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "sms_compliance_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub phone: String,
    pub tenant_id: Uuid,
    pub allowed: bool,
    pub reason: Option<String>,
    /// `transactional` or `promotional`.
    pub message_type: String,
    pub checked_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
