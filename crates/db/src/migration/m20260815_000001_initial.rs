//! Initial schema: tenants, customers, appointments, credit ledger, and
//! SMS compliance tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(INITIAL_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            r"
            DROP TABLE IF EXISTS sms_compliance_log CASCADE;
            DROP TABLE IF EXISTS sms_opt_outs CASCADE;
            DROP TABLE IF EXISTS sms_consent CASCADE;
            DROP TABLE IF EXISTS credit_transactions CASCADE;
            DROP TABLE IF EXISTS appointments CASCADE;
            DROP TABLE IF EXISTS customers CASCADE;
            DROP TABLE IF EXISTS tenants CASCADE;
            DROP TYPE IF EXISTS appointment_status;
            DROP TYPE IF EXISTS credit_operation;
            DROP TYPE IF EXISTS subscription_tier;
            ",
        )
        .await?;
        Ok(())
    }
}

const INITIAL_SQL: &str = r"
CREATE TYPE subscription_tier AS ENUM ('trial', 'starter', 'professional', 'enterprise');
CREATE TYPE credit_operation AS ENUM ('deduct', 'purchase', 'reset');
CREATE TYPE appointment_status AS ENUM ('pending', 'confirmed', 'completed', 'cancelled', 'no_show');

-- Tenants, with the credit balance fields owned by CreditRepository.
-- The CHECK constraints are the last line of defense for the pool
-- invariants; every write path must also use conditional updates.
CREATE TABLE tenants (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name VARCHAR(255) NOT NULL,
    subscription_tier subscription_tier NOT NULL DEFAULT 'trial',
    timezone VARCHAR(64) NOT NULL DEFAULT 'UTC',
    monthly_credits INT NOT NULL DEFAULT 0,
    purchased_credits INT NOT NULL DEFAULT 0,
    credits_used_this_month INT NOT NULL DEFAULT 0,
    credits_reset_date TIMESTAMPTZ NOT NULL DEFAULT now(),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_monthly_credits_non_negative CHECK (monthly_credits >= 0),
    CONSTRAINT chk_purchased_credits_non_negative CHECK (purchased_credits >= 0),
    CONSTRAINT chk_used_this_month_non_negative CHECK (credits_used_this_month >= 0)
);

-- Append-only credit ledger history.
CREATE TABLE credit_transactions (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    amount INT NOT NULL,
    operation credit_operation NOT NULL,
    feature VARCHAR(64) NOT NULL,
    metadata JSONB NOT NULL DEFAULT '{}',
    balance_after INT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_credit_transactions_tenant ON credit_transactions(tenant_id, created_at DESC);

CREATE TABLE customers (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    first_name VARCHAR(255) NOT NULL,
    phone VARCHAR(32),
    birth_date DATE,
    last_visit_at TIMESTAMPTZ,
    birthday_message_sent_this_year BOOLEAN NOT NULL DEFAULT FALSE,
    service_reminder_sent BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_customers_tenant ON customers(tenant_id);

-- Partial indexes for the candidate selection queries.
CREATE INDEX idx_customers_birthday_pending ON customers(birth_date)
    WHERE birthday_message_sent_this_year = FALSE AND birth_date IS NOT NULL;
CREATE INDEX idx_customers_reengagement_pending ON customers(last_visit_at)
    WHERE service_reminder_sent = FALSE AND last_visit_at IS NOT NULL;

CREATE TABLE appointments (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    customer_id UUID NOT NULL REFERENCES customers(id) ON DELETE CASCADE,
    service_name VARCHAR(255) NOT NULL,
    starts_at TIMESTAMPTZ NOT NULL,
    status appointment_status NOT NULL DEFAULT 'pending',
    reminder_24h_sent BOOLEAN NOT NULL DEFAULT FALSE,
    reminder_2h_sent BOOLEAN NOT NULL DEFAULT FALSE,
    no_show_followup_sent BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_appointments_tenant ON appointments(tenant_id, starts_at);
CREATE INDEX idx_appointments_reminder_24h ON appointments(starts_at)
    WHERE reminder_24h_sent = FALSE AND status IN ('pending', 'confirmed');
CREATE INDEX idx_appointments_reminder_2h ON appointments(starts_at)
    WHERE reminder_2h_sent = FALSE AND status IN ('pending', 'confirmed');
CREATE INDEX idx_appointments_no_show ON appointments(starts_at)
    WHERE no_show_followup_sent = FALSE AND status = 'no_show';

-- Consent is scoped to phone + tenant; rows are deactivated, not deleted.
CREATE TABLE sms_consent (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    phone VARCHAR(32) NOT NULL,
    tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    consent_type VARCHAR(32) NOT NULL,
    method VARCHAR(32) NOT NULL,
    purposes JSONB NOT NULL DEFAULT '[]',
    consented_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_sms_consent_phone_tenant ON sms_consent(phone, tenant_id) WHERE is_active;
CREATE INDEX idx_sms_consent_phone ON sms_consent(phone);

-- Opt-out is global per phone number, not per tenant.
CREATE TABLE sms_opt_outs (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    phone VARCHAR(32) NOT NULL UNIQUE,
    opted_out_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    reason TEXT
);

-- Append-only log of every send-eligibility decision.
CREATE TABLE sms_compliance_log (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    phone VARCHAR(32) NOT NULL,
    tenant_id UUID NOT NULL,
    allowed BOOLEAN NOT NULL,
    reason VARCHAR(64),
    message_type VARCHAR(16) NOT NULL,
    checked_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_sms_compliance_log_phone ON sms_compliance_log(phone, checked_at DESC);
CREATE INDEX idx_sms_compliance_log_tenant ON sms_compliance_log(tenant_id, checked_at DESC);
";
