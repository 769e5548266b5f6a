//! Candidate selection and sent-flag updates for the notification jobs.
//!
//! Each job selects its candidates through a time-windowed query filtered
//! on the job's sent-flag being false. The flag flip is a single
//! conditional update checked via `rows_affected`, never a read followed
//! by a separate write, so two overlapping scheduler instances cannot both
//! claim the same candidate.

use sea_orm::{
    ColumnTrait, DatabaseConnection, DbBackend, DbErr, EntityTrait, FromQueryResult, QueryFilter,
    Statement,
};
use uuid::Uuid;

use velora_core::notify::JobKind;

use crate::entities::{appointments, customers};

/// A business record eligible for one notification job in this run.
#[derive(Debug, Clone, FromQueryResult)]
pub struct Candidate {
    /// Appointment or customer ID, depending on the job.
    pub id: Uuid,
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Customer first name, for templating.
    pub customer_name: String,
    /// Tenant business name, for templating.
    pub business_name: String,
    /// Tenant IANA timezone, for quiet-hours evaluation.
    pub timezone: String,
    /// Target phone number; `None` means skip silently.
    pub phone: Option<String>,
    /// Booked service, when the job relates to an appointment.
    pub service_name: Option<String>,
    /// Appointment start, when the job relates to an appointment.
    pub starts_at: Option<chrono::DateTime<chrono::FixedOffset>>,
}

/// Repository for notification candidates and their sent-flags.
#[derive(Debug, Clone)]
pub struct CandidateRepository {
    db: DatabaseConnection,
}

impl CandidateRepository {
    /// Creates a new candidate repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Selects the candidates currently inside the job's time window.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails; the scheduler treats that as
    /// fatal for the run.
    pub async fn find_candidates(&self, job: JobKind) -> Result<Vec<Candidate>, DbErr> {
        let sql = match job {
            JobKind::Reminder24h => appointment_query(
                "a.reminder_24h_sent = FALSE
                 AND a.status IN ('pending', 'confirmed')
                 AND a.starts_at >= now() + INTERVAL '23 hours'
                 AND a.starts_at < now() + INTERVAL '25 hours'",
            ),
            JobKind::Reminder2h => appointment_query(
                "a.reminder_2h_sent = FALSE
                 AND a.status IN ('pending', 'confirmed')
                 AND a.starts_at >= now() + INTERVAL '90 minutes'
                 AND a.starts_at < now() + INTERVAL '150 minutes'",
            ),
            JobKind::NoShowFollowup => appointment_query(
                "a.no_show_followup_sent = FALSE
                 AND a.status = 'no_show'
                 AND a.starts_at >= now() - INTERVAL '7 days'
                 AND a.starts_at < now()",
            ),
            JobKind::Birthday => customer_query(
                "c.birthday_message_sent_this_year = FALSE
                 AND c.birth_date IS NOT NULL
                 AND EXTRACT(MONTH FROM c.birth_date) = EXTRACT(MONTH FROM CURRENT_DATE)
                 AND EXTRACT(DAY FROM c.birth_date) = EXTRACT(DAY FROM CURRENT_DATE)",
            ),
            JobKind::ServiceReengagement => customer_query(
                "c.service_reminder_sent = FALSE
                 AND c.last_visit_at IS NOT NULL
                 AND c.last_visit_at < now() - INTERVAL '60 days'",
            ),
        };

        Candidate::find_by_statement(Statement::from_string(DbBackend::Postgres, sql))
            .all(&self.db)
            .await
    }

    /// Flips the candidate's sent-flag for this job, exactly once.
    ///
    /// Returns `true` only for the caller that actually performed the
    /// false-to-true transition; a concurrent run that lost the race gets
    /// `false` and must not charge or send.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn mark_sent(&self, job: JobKind, candidate_id: Uuid) -> Result<bool, DbErr> {
        let rows_affected = match job {
            JobKind::Reminder24h => {
                self.flip_appointment_flag(appointments::Column::Reminder24hSent, candidate_id)
                    .await?
            }
            JobKind::Reminder2h => {
                self.flip_appointment_flag(appointments::Column::Reminder2hSent, candidate_id)
                    .await?
            }
            JobKind::NoShowFollowup => {
                self.flip_appointment_flag(appointments::Column::NoShowFollowupSent, candidate_id)
                    .await?
            }
            JobKind::Birthday => {
                self.flip_customer_flag(
                    customers::Column::BirthdayMessageSentThisYear,
                    candidate_id,
                )
                .await?
            }
            JobKind::ServiceReengagement => {
                self.flip_customer_flag(customers::Column::ServiceReminderSent, candidate_id)
                    .await?
            }
        };

        Ok(rows_affected == 1)
    }

    async fn flip_appointment_flag(
        &self,
        flag: appointments::Column,
        id: Uuid,
    ) -> Result<u64, DbErr> {
        let result = appointments::Entity::update_many()
            .col_expr(flag, sea_orm::sea_query::Expr::value(true))
            .col_expr(
                appointments::Column::UpdatedAt,
                sea_orm::sea_query::Expr::value(chrono::Utc::now()),
            )
            .filter(appointments::Column::Id.eq(id))
            .filter(flag.eq(false))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn flip_customer_flag(&self, flag: customers::Column, id: Uuid) -> Result<u64, DbErr> {
        let result = customers::Entity::update_many()
            .col_expr(flag, sea_orm::sea_query::Expr::value(true))
            .col_expr(
                customers::Column::UpdatedAt,
                sea_orm::sea_query::Expr::value(chrono::Utc::now()),
            )
            .filter(customers::Column::Id.eq(id))
            .filter(flag.eq(false))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Clears every birthday flag for the yearly rollover.
    ///
    /// The daily birthday job calls this on January 1 before selecting
    /// candidates.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn reset_birthday_flags(&self) -> Result<u64, DbErr> {
        let result = customers::Entity::update_many()
            .col_expr(
                customers::Column::BirthdayMessageSentThisYear,
                sea_orm::sea_query::Expr::value(false),
            )
            .col_expr(
                customers::Column::UpdatedAt,
                sea_orm::sea_query::Expr::value(chrono::Utc::now()),
            )
            .filter(customers::Column::BirthdayMessageSentThisYear.eq(true))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}

fn appointment_query(conditions: &str) -> String {
    format!(
        "SELECT a.id, a.tenant_id, c.first_name AS customer_name,
                t.name AS business_name, t.timezone, c.phone,
                a.service_name, a.starts_at
         FROM appointments a
         JOIN customers c ON c.id = a.customer_id
         JOIN tenants t ON t.id = a.tenant_id
         WHERE {conditions}
         ORDER BY a.starts_at"
    )
}

fn customer_query(conditions: &str) -> String {
    format!(
        "SELECT c.id, c.tenant_id, c.first_name AS customer_name,
                t.name AS business_name, t.timezone, c.phone,
                NULL::varchar AS service_name, NULL::timestamptz AS starts_at
         FROM customers c
         JOIN tenants t ON t.id = c.tenant_id
         WHERE {conditions}
         ORDER BY c.created_at"
    )
}
