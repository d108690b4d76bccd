//! Wallet routes: lifecycle, ledger operations and reads.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_core::wallet::{
    CreateWalletInput, LedgerOperation, ReferenceType, TransactionType, UpdateWalletInput,
    WalletStatus, WalletTransaction,
};
use tally_db::{Applied, TransactionFilter};
use tally_shared::types::{CustomerId, PageRequest, WalletId};
use tracing::info;
use uuid::Uuid;

use crate::{AppState, error::ApiResult, middleware::TenantContext};

/// Creates the wallet routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/wallets", post(create_wallet))
        .route("/customers/{customer_id}/wallets", get(list_customer_wallets))
        .route(
            "/wallets/{wallet_id}",
            get(get_wallet).patch(update_wallet).delete(delete_wallet),
        )
        .route("/wallets/{wallet_id}/top-up", post(top_up))
        .route("/wallets/{wallet_id}/debit", post(debit))
        .route("/wallets/{wallet_id}/terminate", post(terminate))
        .route("/wallets/{wallet_id}/balance", get(get_balance))
        .route("/wallets/{wallet_id}/transactions", get(list_transactions))
        .route("/wallets/{wallet_id}/reconciliation", get(reconcile))
}

/// Query parameters for listing a customer's wallets.
#[derive(Debug, Deserialize)]
pub struct ListWalletsQuery {
    /// Filter by wallet status.
    pub status: Option<WalletStatus>,
}

/// Request body for a top-up.
#[derive(Debug, Deserialize)]
pub struct TopUpRequest {
    /// Amount to credit.
    pub amount: Decimal,
    /// External reference, e.g. a payment id. Generated when omitted.
    pub reference_id: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// JSON object stored on the transaction.
    pub metadata: Option<serde_json::Value>,
    /// Dedup key, unique per wallet.
    pub idempotency_key: Option<String>,
    /// When the unspent part of this credit expires.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Request body for a debit.
#[derive(Debug, Deserialize)]
pub struct DebitRequest {
    /// Amount to debit.
    pub amount: Decimal,
    /// Kind of reference; defaults to `usage`.
    pub reference_type: Option<ReferenceType>,
    /// External reference, e.g. a usage record id.
    pub reference_id: String,
    /// Free-form description.
    pub description: Option<String>,
    /// JSON object stored on the transaction.
    pub metadata: Option<serde_json::Value>,
    /// Dedup key, unique per wallet.
    pub idempotency_key: Option<String>,
}

/// Result of a credit or debit.
#[derive(Debug, Serialize)]
pub struct LedgerResponse {
    /// Transaction written or replayed.
    pub transaction: WalletTransaction,
    /// Wallet balance after the operation.
    pub balance: Decimal,
    /// True for an idempotent replay.
    pub replayed: bool,
}

impl From<Applied> for LedgerResponse {
    fn from(applied: Applied) -> Self {
        Self {
            transaction: applied.transaction,
            balance: applied.wallet.balance,
            replayed: applied.replayed,
        }
    }
}

/// Query parameters for listing transactions.
#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    /// Page number (1-indexed).
    pub page: Option<u32>,
    /// Items per page (max 100).
    pub per_page: Option<u32>,
    /// Only credits or only debits.
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    /// Filter by reference type.
    pub reference_type: Option<ReferenceType>,
    /// Filter by reference id.
    pub reference_id: Option<String>,
}

impl ListTransactionsQuery {
    fn page(&self) -> PageRequest {
        let defaults = PageRequest::default();
        PageRequest {
            page: self.page.unwrap_or(defaults.page),
            per_page: self.per_page.unwrap_or(defaults.per_page),
        }
    }

    fn filter(self) -> TransactionFilter {
        TransactionFilter {
            transaction_type: self.transaction_type,
            reference_type: self.reference_type,
            reference_id: self.reference_id,
        }
    }
}

async fn create_wallet(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(payload): Json<CreateWalletInput>,
) -> ApiResult<impl IntoResponse> {
    let wallet = state.wallets.create(ctx.tenant_id, payload, ctx.actor).await?;
    Ok((StatusCode::CREATED, Json(wallet)))
}

async fn list_customer_wallets(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(customer_id): Path<Uuid>,
    Query(query): Query<ListWalletsQuery>,
) -> ApiResult<impl IntoResponse> {
    let wallets = state
        .wallets
        .list_by_customer(ctx.tenant_id, CustomerId::from_uuid(customer_id), query.status)
        .await?;
    Ok(Json(wallets))
}

async fn get_wallet(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(wallet_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let wallet = state
        .wallets
        .get(ctx.tenant_id, WalletId::from_uuid(wallet_id))
        .await?;
    Ok(Json(wallet))
}

async fn update_wallet(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(wallet_id): Path<Uuid>,
    Json(payload): Json<UpdateWalletInput>,
) -> ApiResult<impl IntoResponse> {
    let wallet = state
        .wallets
        .update(ctx.tenant_id, WalletId::from_uuid(wallet_id), payload, ctx.actor)
        .await?;
    Ok(Json(wallet))
}

async fn delete_wallet(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(wallet_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state
        .wallets
        .soft_delete(ctx.tenant_id, WalletId::from_uuid(wallet_id), ctx.actor)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn top_up(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(wallet_id): Path<Uuid>,
    Json(payload): Json<TopUpRequest>,
) -> ApiResult<impl IntoResponse> {
    let wallet_id = WalletId::from_uuid(wallet_id);
    let reference_id = payload
        .reference_id
        .unwrap_or_else(|| Uuid::now_v7().to_string());

    let mut op = LedgerOperation::credit(wallet_id, payload.amount, ReferenceType::Topup, reference_id)
        .with_actor(ctx.actor);
    if let Some(description) = payload.description {
        op = op.with_description(description);
    }
    if let Some(metadata) = payload.metadata {
        op = op.with_metadata(metadata);
    }
    if let Some(key) = payload.idempotency_key {
        op = op.with_idempotency_key(key);
    }
    if let Some(expires_at) = payload.expires_at {
        op = op.with_expiry(expires_at);
    }

    let applied = state.ledger.credit_with_retry(ctx.tenant_id, op).await?;
    info!(
        tenant_id = %ctx.tenant_id,
        wallet_id = %wallet_id,
        replayed = applied.replayed,
        "Wallet topped up"
    );
    Ok(Json(LedgerResponse::from(applied)))
}

async fn debit(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(wallet_id): Path<Uuid>,
    Json(payload): Json<DebitRequest>,
) -> ApiResult<impl IntoResponse> {
    let wallet_id = WalletId::from_uuid(wallet_id);
    let reference_type = payload.reference_type.unwrap_or(ReferenceType::Usage);

    let mut op = LedgerOperation::debit(wallet_id, payload.amount, reference_type, payload.reference_id)
        .with_actor(ctx.actor);
    if let Some(description) = payload.description {
        op = op.with_description(description);
    }
    if let Some(metadata) = payload.metadata {
        op = op.with_metadata(metadata);
    }
    if let Some(key) = payload.idempotency_key {
        op = op.with_idempotency_key(key);
    }

    let applied = state.ledger.debit_with_retry(ctx.tenant_id, op).await?;
    Ok(Json(LedgerResponse::from(applied)))
}

async fn terminate(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(wallet_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let result = state
        .wallets
        .terminate(ctx.tenant_id, WalletId::from_uuid(wallet_id), ctx.actor)
        .await?;
    Ok(Json(result))
}

async fn get_balance(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(wallet_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let balance = state
        .wallets
        .get_balance(ctx.tenant_id, WalletId::from_uuid(wallet_id))
        .await?;
    Ok(Json(balance))
}

async fn list_transactions(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(wallet_id): Path<Uuid>,
    Query(query): Query<ListTransactionsQuery>,
) -> ApiResult<impl IntoResponse> {
    let page = query.page();
    let filter = query.filter();
    let transactions = state
        .transactions
        .list(ctx.tenant_id, WalletId::from_uuid(wallet_id), &filter, page)
        .await?;
    Ok(Json(transactions))
}

async fn reconcile(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(wallet_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let reconciliation = state
        .transactions
        .reconcile(ctx.tenant_id, WalletId::from_uuid(wallet_id))
        .await?;
    Ok(Json(reconciliation))
}
