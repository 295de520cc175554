//! Physical counts.

use axum::extract::{Path, State};
use axum::Json;
use stockline_core::stock_take::{StockTakeReport, StockTakeRequest};

use super::{found, Success};
use crate::error::ApiResult;
use crate::AppState;

/// `{ "success": true, "stockTakeId": .., "adjustments": [..] }`
pub async fn post_stock_take(
    State(state): State<AppState>,
    Json(body): Json<StockTakeRequest>,
) -> ApiResult<Json<Success<StockTakeReport>>> {
    let report = state.db.stock_takes().post_stock_take(&body).await?;
    Ok(Json(Success::new(report)))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<StockTakeReport>> {
    let report = state.db.stock_takes().get(&id).await?;
    Ok(Json(found(report, "StockTake", &id)?))
}

pub async fn list_for_store(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
) -> ApiResult<Json<Vec<StockTakeReport>>> {
    Ok(Json(state.db.stock_takes().list_for_store(&store_id).await?))
}
