//! Provider webhook routes.
//!
//! Webhooks acknowledge with 200 whenever the payload was understood, even
//! when the keyword required no action, so the provider does not retry.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::AppState;
use velora_db::{ComplianceRepository, CreditRepository};
use velora_shared::types::TenantId;

/// Creates the webhook routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/webhooks/sms/inbound", post(sms_inbound))
        .route("/webhooks/payments", post(payment_completed))
}

/// Inbound SMS callback from the provider.
#[derive(Debug, Deserialize)]
pub struct InboundSmsRequest {
    /// Sender phone number.
    pub from: String,
    /// Raw message body.
    pub body: String,
    /// Tenant that owns the receiving number.
    pub tenant_id: TenantId,
}

/// What the webhook did with the message.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InboundAction {
    /// Recorded a global opt-out.
    OptedOut,
    /// Removed the opt-out and restored consent for the tenant.
    OptedIn,
    /// The body was not a recognized keyword.
    Ignored,
}

/// Carrier-standard opt-out keywords.
const OPT_OUT_KEYWORDS: [&str; 5] = ["STOP", "STOPALL", "UNSUBSCRIBE", "CANCEL", "QUIT"];
/// Carrier-standard opt-in keywords.
const OPT_IN_KEYWORDS: [&str; 3] = ["START", "YES", "UNSTOP"];

/// Classifies an inbound message body by its first word.
fn classify_keyword(body: &str) -> Option<InboundAction> {
    let keyword = body.split_whitespace().next()?.to_uppercase();
    if OPT_OUT_KEYWORDS.contains(&keyword.as_str()) {
        Some(InboundAction::OptedOut)
    } else if OPT_IN_KEYWORDS.contains(&keyword.as_str()) {
        Some(InboundAction::OptedIn)
    } else {
        None
    }
}

async fn sms_inbound(
    State(state): State<AppState>,
    Json(req): Json<InboundSmsRequest>,
) -> impl IntoResponse {
    let repo = ComplianceRepository::new((*state.db).clone());

    let action = match classify_keyword(&req.body) {
        Some(InboundAction::OptedOut) => {
            if let Err(e) = repo.process_opt_out(&req.from, Some(req.body.trim())).await {
                error!(phone = %req.from, error = %e, "failed to process opt-out");
                return internal_error();
            }
            info!(phone = %req.from, "processed SMS opt-out");
            InboundAction::OptedOut
        }
        Some(InboundAction::OptedIn) => {
            if let Err(e) = repo.process_opt_in(&req.from, req.tenant_id, "keyword").await {
                error!(phone = %req.from, error = %e, "failed to process opt-in");
                return internal_error();
            }
            info!(phone = %req.from, tenant_id = %req.tenant_id, "processed SMS opt-in");
            InboundAction::OptedIn
        }
        _ => InboundAction::Ignored,
    };

    (StatusCode::OK, Json(json!({ "action": action }))).into_response()
}

/// Payment-completed callback for a credit pack purchase.
#[derive(Debug, Deserialize)]
pub struct PaymentCompletedRequest {
    /// Purchasing tenant.
    pub tenant_id: TenantId,
    /// Credits in the purchased pack.
    pub credits: i32,
    /// Pack identifier, e.g. `pack_1000`.
    pub pack_id: String,
    /// Payment processor reference.
    pub payment_ref: String,
}

async fn payment_completed(
    State(state): State<AppState>,
    Json(req): Json<PaymentCompletedRequest>,
) -> impl IntoResponse {
    let repo = CreditRepository::new((*state.db).clone());

    match repo
        .add_purchased(req.tenant_id, req.credits, &req.pack_id, &req.payment_ref)
        .await
    {
        Ok(balance) => {
            info!(
                tenant_id = %req.tenant_id,
                credits = req.credits,
                pack_id = %req.pack_id,
               "credited purchased pack"
            );
            (
                StatusCode::OK,
                Json(json!({
                    "monthly_credits": balance.monthly,
                    "purchased_credits": balance.purchased,
                    "total": balance.total(),
                })),
            )
                .into_response()
        }
        Err(e) => super::credits::credit_error_response(&e),
    }
}

fn internal_error() -> axum::response::Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "internal_error",
            "message": "An error occurred"
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("STOP")]
    #[case("stop")]
    #[case("STOPALL")]
    #[case("Unsubscribe")]
    #[case("CANCEL")]
    #[case("QUIT")]
    #[case("STOP texting me")]
    fn test_opt_out_keywords(#[case] body: &str) {
        assert_eq!(classify_keyword(body), Some(InboundAction::OptedOut));
    }

    #[rstest]
    #[case("START")]
    #[case("yes")]
    #[case("UNSTOP")]
    fn test_opt_in_keywords(#[case] body: &str) {
        assert_eq!(classify_keyword(body), Some(InboundAction::OptedIn));
    }

    #[rstest]
    #[case("hello")]
    #[case("")]
    #[case("   ")]
    #[case("PLEASE STOP")]
    fn test_other_bodies_are_ignored(#[case] body: &str) {
        assert_eq!(classify_keyword(body), None);
    }
}
