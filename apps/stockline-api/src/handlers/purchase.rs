//! Purchase orders and goods receiving.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use stockline_core::purchase::{
    InventoryReceipt, NewPurchaseOrder, PurchaseOrder, PurchaseOrderDetail, PurchaseOrderStatus,
    ReceiveItemsRequest,
};
use stockline_core::tax::OrderLineInput;

use super::{found, ActorBody};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusFilter {
    pub status: Option<PurchaseOrderStatus>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<StatusFilter>,
) -> ApiResult<Json<Vec<PurchaseOrder>>> {
    Ok(Json(state.db.purchases().list(filter.status).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<NewPurchaseOrder>,
) -> ApiResult<(StatusCode, Json<PurchaseOrderDetail>)> {
    let order = state.db.purchases().create(&body).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PurchaseOrderDetail>> {
    let order = state.db.purchases().get(&id).await?;
    Ok(Json(found(order, "PurchaseOrder", &id)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceItemsBody {
    pub items: Vec<OrderLineInput>,
    pub actor_id: String,
}

/// Only a Draft order's lines can be replaced.
pub async fn replace_items(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ReplaceItemsBody>,
) -> ApiResult<Json<PurchaseOrderDetail>> {
    let order = state
        .db
        .purchases()
        .replace_items(&id, &body.items, &body.actor_id)
        .await?;
    Ok(Json(order))
}

pub async fn send(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActorBody>,
) -> ApiResult<Json<PurchaseOrder>> {
    Ok(Json(state.db.purchases().send(&id, &body.actor_id).await?))
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActorBody>,
) -> ApiResult<Json<PurchaseOrder>> {
    Ok(Json(state.db.purchases().cancel(&id, &body.actor_id).await?))
}

pub async fn receipts(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<InventoryReceipt>>> {
    Ok(Json(state.db.purchases().receipts(&id).await?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveItemsResponse {
    pub success: bool,
    pub purchase_order_id: String,
    pub po_status: PurchaseOrderStatus,
    pub receipts: Vec<InventoryReceipt>,
}

pub async fn receive_items(
    State(state): State<AppState>,
    Json(body): Json<ReceiveItemsRequest>,
) -> ApiResult<Json<ReceiveItemsResponse>> {
    let outcome = state.db.purchases().receive_items(&body).await?;
    Ok(Json(ReceiveItemsResponse {
        success: true,
        purchase_order_id: outcome.purchase_order_id,
        po_status: outcome.po_status,
        receipts: outcome.receipts,
    }))
}
