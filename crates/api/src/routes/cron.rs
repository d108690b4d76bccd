//! Endpoints invoked by the external scheduler.

use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};
use chrono::Utc;

use crate::{AppState, error::ApiResult, middleware::TenantContext};

/// Creates the scheduler routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cron/wallets/auto-top-up", post(run_auto_top_up))
        .route("/cron/wallets/expire-credits", post(run_credit_expiry))
        .route("/cron/wallets/check-alerts", post(run_balance_alerts))
}

async fn run_auto_top_up(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> ApiResult<impl IntoResponse> {
    let report = state.auto_top_up.run(ctx.tenant_id).await?;
    Ok(Json(report))
}

/// Expires credits whose `expires_at` has passed.
async fn run_credit_expiry(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> ApiResult<impl IntoResponse> {
    let report = state.credit_expiry.run(ctx.tenant_id, Utc::now()).await?;
    Ok(Json(report))
}

async fn run_balance_alerts(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> ApiResult<impl IntoResponse> {
    let report = state.balance_alerts.run(ctx.tenant_id).await?;
    Ok(Json(report))
}
