//! API route definitions.

use axum::Router;

use crate::AppState;

pub mod cron;
pub mod health;
pub mod settlements;
pub mod wallets;

/// Creates the API router with all routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(wallets::routes())
        .merge(settlements::routes())
        .merge(cron::routes())
}
