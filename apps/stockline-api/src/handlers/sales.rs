//! Sales order lifecycle, rider assignment and stock reversal.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use stockline_core::sales::{FulfillmentStatus, NewSalesOrder, ReversalLine, SalesOrder, SalesOrderDetail};

use super::{found, ActorBody};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusFilter {
    /// Fulfillment code, `0..=5`.
    pub my_status: Option<i32>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<StatusFilter>,
) -> ApiResult<Json<Vec<SalesOrder>>> {
    let my_status = filter
        .my_status
        .map(FulfillmentStatus::try_from)
        .transpose()
        .map_err(ApiError::validation)?;
    Ok(Json(state.db.sales().list(my_status).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<NewSalesOrder>,
) -> ApiResult<(StatusCode, Json<SalesOrderDetail>)> {
    let order = state.db.sales().create(&body).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<SalesOrderDetail>> {
    let order = state.db.sales().get(&id).await?;
    Ok(Json(found(order, "SalesOrder", &id)?))
}

pub async fn approve(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActorBody>,
) -> ApiResult<Json<SalesOrder>> {
    Ok(Json(state.db.sales().approve(&id, &body.actor_id).await?))
}

pub async fn decline(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActorBody>,
) -> ApiResult<Json<SalesOrder>> {
    Ok(Json(state.db.sales().decline(&id, &body.actor_id).await?))
}

pub async fn dispatch(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActorBody>,
) -> ApiResult<Json<SalesOrder>> {
    Ok(Json(state.db.sales().dispatch(&id, &body.actor_id).await?))
}

pub async fn close_short(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActorBody>,
) -> ApiResult<Json<SalesOrder>> {
    Ok(Json(state.db.sales().close_short(&id, &body.actor_id).await?))
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActorBody>,
) -> ApiResult<Json<SalesOrder>> {
    Ok(Json(state.db.sales().cancel(&id, &body.actor_id).await?))
}

/// Exactly one of `orderId` or `deliveryNoteId`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRiderBody {
    pub order_id: Option<String>,
    pub delivery_note_id: Option<String>,
    pub rider_id: String,
    pub actor_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRiderResponse {
    pub success: bool,
    pub order_id: Option<String>,
    pub delivery_note_id: Option<String>,
    pub rider_id: String,
}

pub async fn assign_rider(
    State(state): State<AppState>,
    Json(body): Json<AssignRiderBody>,
) -> ApiResult<Json<AssignRiderResponse>> {
    match (&body.order_id, &body.delivery_note_id) {
        (Some(order_id), None) => {
            state
                .db
                .sales()
                .assign_rider(order_id, &body.rider_id, &body.actor_id)
                .await?;
        }
        (None, Some(note_id)) => {
            state
                .db
                .deliveries()
                .assign_rider(note_id, &body.rider_id, &body.actor_id)
                .await?;
        }
        _ => {
            return Err(ApiError::validation(
                "exactly one of orderId or deliveryNoteId is required",
            ))
        }
    }

    Ok(Json(AssignRiderResponse {
        success: true,
        order_id: body.order_id,
        delivery_note_id: body.delivery_note_id,
        rider_id: body.rider_id,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseBody {
    #[serde(alias = "salesOrderId")]
    pub order_id: String,
    pub actor_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseResponse {
    pub success: bool,
    pub sales_order_id: String,
    pub store_id: String,
    pub restored: Vec<ReversalLine>,
}

/// Returns shipped stock of a cancelled order. A repeated call restores
/// nothing.
pub async fn receive_back_to_stock(
    State(state): State<AppState>,
    Json(body): Json<ReverseBody>,
) -> ApiResult<Json<ReverseResponse>> {
    let outcome = state
        .db
        .sales()
        .receive_back_to_stock(&body.order_id, &body.actor_id)
        .await?;
    Ok(Json(ReverseResponse {
        success: true,
        sales_order_id: outcome.sales_order_id,
        store_id: outcome.store_id,
        restored: outcome.restored,
    }))
}
