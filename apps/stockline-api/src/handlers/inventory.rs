//! Ledger primitives, opening balances and the stock summary.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use stockline_core::ledger::{
    AdjustStockRequest, AdjustmentOutcome, InventoryLine, InventoryTransaction, StockSnapshot, StockSummary,
};
use stockline_core::opening::{OpeningBalance, OpeningBalanceInput};

use super::{Ack, Success};
use crate::error::ApiResult;
use crate::AppState;

const DEFAULT_TRANSACTION_LIMIT: u32 = 100;
const MAX_TRANSACTION_LIMIT: u32 = 1000;

pub async fn adjust(
    State(state): State<AppState>,
    Json(body): Json<AdjustStockRequest>,
) -> ApiResult<Json<Success<AdjustmentOutcome>>> {
    let outcome = state.db.inventory().adjust(&body).await?;
    Ok(Json(Success::new(outcome)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotQuery {
    pub as_of: NaiveDate,
}

/// Quantities as they stood at the end of `asOf`.
pub async fn snapshot(
    State(state): State<AppState>,
    Query(query): Query<SnapshotQuery>,
) -> ApiResult<Json<StockSnapshot>> {
    Ok(Json(state.db.inventory().snapshot_as_of(query.as_of).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionQuery {
    pub store_id: Option<String>,
    pub product_id: Option<String>,
    pub limit: Option<u32>,
}

pub async fn transactions(
    State(state): State<AppState>,
    Query(query): Query<TransactionQuery>,
) -> ApiResult<Json<Vec<InventoryTransaction>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_TRANSACTION_LIMIT)
        .clamp(1, MAX_TRANSACTION_LIMIT);
    let history = state
        .db
        .inventory()
        .transactions(query.store_id.as_deref(), query.product_id.as_deref(), limit)
        .await?;
    Ok(Json(history))
}

pub async fn store_lines(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
) -> ApiResult<Json<Vec<InventoryLine>>> {
    Ok(Json(state.db.inventory().lines_for_store(&store_id).await?))
}

pub async fn stock_summary(State(state): State<AppState>) -> ApiResult<Json<StockSummary>> {
    Ok(Json(state.db.inventory().stock_summary().await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpeningQuantitiesBody {
    pub items: Vec<OpeningBalanceInput>,
    pub actor_id: String,
}

/// `{ "success": true }` or 409 with `duplicateItems`.
pub async fn save_opening_quantities(
    State(state): State<AppState>,
    Json(body): Json<OpeningQuantitiesBody>,
) -> ApiResult<Json<Ack>> {
    state
        .db
        .inventory()
        .save_opening_quantities(&body.items, &body.actor_id)
        .await?;
    Ok(Json(Ack::ok()))
}

#[derive(Debug, Serialize)]
pub struct OpeningBalances {
    pub items: Vec<OpeningBalance>,
}

pub async fn opening_balances(State(state): State<AppState>) -> ApiResult<Json<OpeningBalances>> {
    let items = state.db.inventory().opening_balances().await?;
    Ok(Json(OpeningBalances { items }))
}
