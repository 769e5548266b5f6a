//! Message templates for the notification jobs.
//!
//! Bodies stay under one SMS segment where possible; keep additions short.

use serde::{Deserialize, Serialize};

use super::job::JobKind;

/// Candidate fields interpolated into a message body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageContext {
    /// Customer first name.
    pub customer_name: String,
    /// Tenant business name.
    pub business_name: String,
    /// Booked service, when the job relates to an appointment.
    pub service_name: Option<String>,
    /// Appointment time already formatted in the customer's local time.
    pub appointment_time: Option<String>,
}

impl MessageContext {
    fn service(&self) -> &str {
        self.service_name.as_deref().unwrap_or("your appointment")
    }

    fn time(&self) -> &str {
        self.appointment_time.as_deref().unwrap_or("soon")
    }
}

/// Renders the message body for a job from candidate data.
#[must_use]
pub fn render(job: JobKind, ctx: &MessageContext) -> String {
    match job {
        JobKind::Reminder24h => format!(
            "Hi {}, this is a reminder from {}: {} is tomorrow at {}. Reply STOP to opt out.",
            ctx.customer_name,
            ctx.business_name,
            ctx.service(),
            ctx.time(),
        ),
        JobKind::Reminder2h => format!(
            "Hi {}, see you at {} today at {} for {}. Reply STOP to opt out.",
            ctx.customer_name,
            ctx.business_name,
            ctx.time(),
            ctx.service(),
        ),
        JobKind::Birthday => format!(
            "Happy birthday, {}! Everyone at {} wishes you a wonderful day. Reply STOP to opt out.",
            ctx.customer_name, ctx.business_name,
        ),
        JobKind::ServiceReengagement => format!(
            "Hi {}, it's been a while since your last visit to {}. We'd love to see you again! Reply STOP to opt out.",
            ctx.customer_name, ctx.business_name,
        ),
        JobKind::NoShowFollowup => format!(
            "Hi {}, we missed you at {} for {}. Want to rebook? Reply STOP to opt out.",
            ctx.customer_name,
            ctx.business_name,
            ctx.service(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> MessageContext {
        MessageContext {
            customer_name: "Ana".into(),
            business_name: "Shear Bliss".into(),
            service_name: Some("Balayage".into()),
            appointment_time: Some("2:30 PM".into()),
        }
    }

    #[test]
    fn test_reminder_24h_includes_time_and_service() {
        let body = render(JobKind::Reminder24h, &ctx());
        assert!(body.contains("Ana"));
        assert!(body.contains("Shear Bliss"));
        assert!(body.contains("Balayage"));
        assert!(body.contains("2:30 PM"));
    }

    #[test]
    fn test_missing_optional_fields_fall_back() {
        let sparse = MessageContext {
            customer_name: "Ana".into(),
            business_name: "Shear Bliss".into(),
            ..Default::default()
        };
        let body = render(JobKind::Reminder2h, &sparse);
        assert!(body.contains("your appointment"));
        assert!(body.contains("soon"));
    }

    #[test]
    fn test_every_template_carries_stop_instructions() {
        for job in JobKind::ALL {
            let body = render(job, &ctx());
            assert!(
                body.contains("Reply STOP"),
                "{job} template is missing opt-out instructions"
            );
        }
    }
}
