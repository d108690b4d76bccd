//! Invoice settlement routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use tally_core::wallet::SettlementRequest;
use tally_shared::types::SettlementId;
use uuid::Uuid;

use crate::{AppState, error::ApiResult, middleware::TenantContext};

/// Creates the settlement routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/settlements", post(settle))
        .route("/settlements/{settlement_id}", get(get_settlement))
}

/// Settles an invoice. Partial collection is a successful response with
/// `remaining_due > 0` and per-wallet results.
async fn settle(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(payload): Json<SettlementRequest>,
) -> ApiResult<impl IntoResponse> {
    let outcome = state
        .settlements
        .settle(ctx.tenant_id, payload, ctx.actor)
        .await?;
    Ok(Json(outcome))
}

async fn get_settlement(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(settlement_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let outcome = state
        .settlements
        .get(ctx.tenant_id, SettlementId::from_uuid(settlement_id))
        .await?;
    Ok(Json(outcome))
}
