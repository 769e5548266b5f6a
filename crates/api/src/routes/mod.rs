//! API route definitions.

use axum::Router;

use crate::AppState;

pub mod credits;
pub mod health;
pub mod webhooks;

/// Creates the API router with all routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(webhooks::routes())
        .merge(credits::routes())
}
