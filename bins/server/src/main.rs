//! Velora API server.
//!
//! Serves the HTTP API and runs the notification job loops, one per job
//! kind on its own cadence.

use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use velora_api::{create_router, AppState};
use velora_core::compliance::{FailurePolicy, QuietHours};
use velora_core::notify::JobKind;
use velora_db::{
    connect, CandidateRepository, ComplianceGate, ComplianceRepository, CreditRepository,
};
use velora_scheduler::{
    ConsoleSmsProvider, JobRunner, PgCandidateStore, PgComplianceStore, PgCreditStore,
    TracingAuditSink,
};
use velora_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "velora=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load()?;

    // Connect to database
    let db = connect(&config.database.url).await?;
    info!("Connected to database");

    // One dispatch loop per job kind, each on its own cadence
    for job in JobKind::ALL {
        spawn_job_loop(job, db.clone(), &config);
    }

    // Create application state and router
    let state = AppState { db: Arc::new(db) };
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Spawns the interval loop that re-runs one job on its cadence.
fn spawn_job_loop(job: JobKind, db: DatabaseConnection, config: &AppConfig) {
    let quiet = QuietHours {
        start_hour: config.compliance.quiet_start_hour,
        end_hour: config.compliance.quiet_end_hour,
    };
    let policy = FailurePolicy::from_fail_open(config.compliance.fail_open);
    let send_timeout = Duration::from_secs(config.provider.send_timeout_secs);

    tokio::spawn(async move {
        let gate = ComplianceGate::new(ComplianceRepository::new(db.clone()), policy, quiet);
        let runner = JobRunner::new(
            PgCandidateStore::new(CandidateRepository::new(db.clone())),
            PgComplianceStore::new(gate),
            PgCreditStore::new(CreditRepository::new(db)),
            ConsoleSmsProvider,
            TracingAuditSink,
            send_timeout,
        );

        let mut interval = tokio::time::interval(job.cadence());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match runner.run(job).await {
                Ok(summary) => {
                    if summary.examined > 0 {
                        info!(%job, sent = summary.sent, "job cycle finished");
                    }
                }
                Err(e) => error!(%job, error = %e, "job run aborted"),
            }
        }
    });
}
