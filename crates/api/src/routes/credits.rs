//! Tenant credit endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::AppState;
use velora_core::credits::{Balance, CreditError};
use velora_db::{entities::credit_transactions, CreditRepository};
use velora_shared::types::{PageRequest, PageResponse, TenantId};

/// Creates the credit routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tenants/{tenant_id}/credits", get(get_balance))
        .route("/tenants/{tenant_id}/credits/history", get(get_history))
        .route("/tenants/{tenant_id}/credits/reset", post(reset_cycle))
}

/// Balance snapshot response.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Monthly pool, resets each billing cycle.
    pub monthly_credits: i32,
    /// Purchased pool, never expires.
    pub purchased_credits: i32,
    /// Spend counter for the current cycle.
    pub used_this_month: i32,
    /// Combined spendable credits.
    pub total: i64,
    /// Next scheduled monthly reset.
    pub reset_date: DateTime<Utc>,
}

impl From<Balance> for BalanceResponse {
    fn from(b: Balance) -> Self {
        Self {
            monthly_credits: b.monthly,
            purchased_credits: b.purchased,
            used_this_month: b.used_this_month,
            total: b.total(),
            reset_date: b.reset_date,
        }
    }
}

/// One ledger entry in the history response.
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    /// Ledger entry ID.
    pub id: Uuid,
    /// Signed credit delta.
    pub amount: i32,
    /// `deduct`, `purchase`, or `reset`.
    pub operation: String,
    /// What the credits were spent on or granted for.
    pub feature: String,
    /// Operation-specific details.
    pub metadata: serde_json::Value,
    /// Total balance after this entry.
    pub balance_after: i32,
    /// When the entry was recorded.
    pub created_at: DateTime<Utc>,
}

impl From<credit_transactions::Model> for TransactionResponse {
    fn from(m: credit_transactions::Model) -> Self {
        use velora_db::entities::sea_orm_active_enums::CreditOperation;
        let operation = match m.operation {
            CreditOperation::Deduct => "deduct",
            CreditOperation::Purchase => "purchase",
            CreditOperation::Reset => "reset",
        };
        Self {
            id: m.id,
            amount: m.amount,
            operation: operation.to_string(),
            feature: m.feature,
            metadata: m.metadata,
            balance_after: m.balance_after,
            created_at: m.created_at.with_timezone(&Utc),
        }
    }
}

async fn get_balance(
    State(state): State<AppState>,
    Path(tenant_id): Path<TenantId>,
) -> impl IntoResponse {
    let repo = CreditRepository::new((*state.db).clone());
    match repo.balance(tenant_id).await {
        Ok(balance) => (StatusCode::OK, Json(BalanceResponse::from(balance))).into_response(),
        Err(e) => credit_error_response(&e),
    }
}

async fn get_history(
    State(state): State<AppState>,
    Path(tenant_id): Path<TenantId>,
    Query(page): Query<PageRequest>,
) -> impl IntoResponse {
    let repo = CreditRepository::new((*state.db).clone());
    match repo.history(tenant_id, &page).await {
        Ok((rows, total)) => {
            let data: Vec<TransactionResponse> =
                rows.into_iter().map(TransactionResponse::from).collect();
            (StatusCode::OK, Json(PageResponse::new(data, &page, total))).into_response()
        }
        Err(e) => credit_error_response(&e),
    }
}

async fn reset_cycle(
    State(state): State<AppState>,
    Path(tenant_id): Path<TenantId>,
) -> impl IntoResponse {
    let repo = CreditRepository::new((*state.db).clone());
    match repo.reset_monthly(tenant_id).await {
        Ok(reset) => {
            if reset {
                info!(%tenant_id, "monthly credits reset");
            }
            (StatusCode::OK, Json(json!({ "reset": reset }))).into_response()
        }
        Err(e) => credit_error_response(&e),
    }
}

/// Maps a ledger error onto an HTTP response using the error's own status
/// and code. Server-side faults get a generic message.
pub(crate) fn credit_error_response(e: &CreditError) -> axum::response::Response {
    let status = StatusCode::from_u16(e.http_status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let message = if status.is_server_error() {
        error!(error = %e, "credit operation failed");
        "An error occurred".to_string()
    } else {
        e.to_string()
    };
    (
        status,
        Json(json!({
            "error": e.error_code(),
            "message": message
        })),
    )
        .into_response()
}
