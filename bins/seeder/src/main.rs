//! Database seeder for Velora development and testing.
//!
//! Seeds a demo salon with customers, upcoming appointments inside the
//! reminder windows, and a consent record, so the job loops have work to
//! do immediately after startup.
//!
//! Usage: cargo run --bin seeder

use chrono::{Datelike, Duration, NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use uuid::Uuid;

use velora_core::credits::SubscriptionTier;
use velora_db::entities::{appointments, customers, sea_orm_active_enums, tenants};
use velora_db::repositories::RecordConsentInput;
use velora_db::{ComplianceRepository, CreditRepository};
use velora_shared::types::TenantId;

/// Demo tenant ID (consistent for all seeds)
const DEMO_TENANT_ID: &str = "00000000-0000-0000-0000-000000000001";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set in environment");

    println!("Connecting to database...");
    let db = velora_db::connect(&database_url)
        .await
        .expect("Failed to connect to database");

    println!("Seeding demo tenant...");
    seed_demo_tenant(&db).await;

    println!("Seeding customers and appointments...");
    seed_customers(&db).await;

    println!("Seeding consent...");
    seed_consent(&db).await;

    println!("Seeding complete!");
}

fn demo_tenant_id() -> Uuid {
    Uuid::parse_str(DEMO_TENANT_ID).unwrap()
}

async fn seed_demo_tenant(db: &DatabaseConnection) {
    if tenants::Entity::find_by_id(demo_tenant_id())
        .one(db)
        .await
        .expect("Failed to query tenants")
        .is_some()
    {
        println!("  demo tenant already exists, skipping");
        return;
    }

    let now = Utc::now();
    tenants::ActiveModel {
        id: Set(demo_tenant_id()),
        name: Set("Glow Salon".to_string()),
        subscription_tier: Set(sea_orm_active_enums::SubscriptionTier::Professional),
        timezone: Set("America/New_York".to_string()),
        monthly_credits: Set(0),
        purchased_credits: Set(0),
        credits_used_this_month: Set(0),
        credits_reset_date: Set(now.into()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await
    .expect("Failed to insert demo tenant");

    CreditRepository::new(db.clone())
        .initialize(
            TenantId::from_uuid(demo_tenant_id()),
            SubscriptionTier::Professional,
        )
        .await
        .expect("Failed to initialize demo tenant credits");
}

async fn seed_customers(db: &DatabaseConnection) {
    let now = Utc::now();
    let today = now.date_naive();

    // Birthday today, so the birthday job picks her up.
    let birthday = NaiveDate::from_ymd_opt(1992, today.month(), today.day().min(28))
        .expect("valid seed birthday");

    let customers_data = [
        ("Dana", Some("+15550000001"), Some(birthday), None),
        // Lapsed: last visit 90 days ago, re-engagement candidate.
        (
            "Maya",
            Some("+15550000002"),
            None,
            Some(now - Duration::days(90)),
        ),
        // No phone on file; always skipped.
        ("Iris", None, None, None),
    ];

    let mut first_customer = None;
    for (name, phone, birth_date, last_visit) in customers_data {
        let id = Uuid::new_v4();
        first_customer.get_or_insert(id);
        customers::ActiveModel {
            id: Set(id),
            tenant_id: Set(demo_tenant_id()),
            first_name: Set(name.to_string()),
            phone: Set(phone.map(String::from)),
            birth_date: Set(birth_date),
            last_visit_at: Set(last_visit.map(Into::into)),
            birthday_message_sent_this_year: Set(false),
            service_reminder_sent: Set(false),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(db)
        .await
        .expect("Failed to insert customer");
    }

    let customer_id = first_customer.expect("at least one customer seeded");

    // One appointment in each reminder window plus a recent no-show.
    let appointments_data = [
        (Duration::hours(24), sea_orm_active_enums::AppointmentStatus::Confirmed),
        (Duration::hours(2), sea_orm_active_enums::AppointmentStatus::Confirmed),
        (Duration::days(-2), sea_orm_active_enums::AppointmentStatus::NoShow),
    ];

    for (offset, status) in appointments_data {
        appointments::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(demo_tenant_id()),
            customer_id: Set(customer_id),
            service_name: Set("Balayage".to_string()),
            starts_at: Set((now + offset).into()),
            status: Set(status),
            reminder_24h_sent: Set(false),
            reminder_2h_sent: Set(false),
            no_show_followup_sent: Set(false),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(db)
        .await
        .expect("Failed to insert appointment");
    }
}

async fn seed_consent(db: &DatabaseConnection) {
    ComplianceRepository::new(db.clone())
        .record_consent(RecordConsentInput {
            phone: "+15550000001".to_string(),
            tenant_id: TenantId::from_uuid(demo_tenant_id()),
            consent_type: "promotional".to_string(),
            method: "web_form".to_string(),
            purposes: vec!["promotional".to_string()],
        })
        .await
        .expect("Failed to insert consent");
}
