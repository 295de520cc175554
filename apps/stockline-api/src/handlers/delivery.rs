//! Delivery notes and shipment.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use stockline_core::delivery::{DeliveryNote, DeliveryNoteDetail, NewDeliveryNote};

use super::{found, ActorBody};
use crate::error::ApiResult;
use crate::AppState;

pub async fn list_for_order(
    State(state): State<AppState>,
    Path(sales_order_id): Path<String>,
) -> ApiResult<Json<Vec<DeliveryNote>>> {
    Ok(Json(state.db.deliveries().list_for_order(&sales_order_id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<NewDeliveryNote>,
) -> ApiResult<(StatusCode, Json<DeliveryNoteDetail>)> {
    let note = state.db.deliveries().create(&body).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<DeliveryNoteDetail>> {
    let note = state.db.deliveries().get(&id).await?;
    Ok(Json(found(note, "DeliveryNote", &id)?))
}

pub async fn prepare(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActorBody>,
) -> ApiResult<Json<DeliveryNote>> {
    Ok(Json(state.db.deliveries().prepare(&id, &body.actor_id).await?))
}

pub async fn dispatch(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActorBody>,
) -> ApiResult<Json<DeliveryNote>> {
    Ok(Json(state.db.deliveries().dispatch(&id, &body.actor_id).await?))
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActorBody>,
) -> ApiResult<Json<DeliveryNote>> {
    Ok(Json(state.db.deliveries().cancel(&id, &body.actor_id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkDeliveredBody {
    pub delivery_note_id: String,
    pub actor_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkDeliveredResponse {
    pub success: bool,
    #[serde(flatten)]
    pub note: DeliveryNoteDetail,
}

/// Ships every line of the note. Insufficient stock on any line answers 422
/// and nothing is written.
pub async fn mark_delivered(
    State(state): State<AppState>,
    Json(body): Json<MarkDeliveredBody>,
) -> ApiResult<Json<MarkDeliveredResponse>> {
    let note = state
        .db
        .deliveries()
        .mark_delivered(&body.delivery_note_id, &body.actor_id)
        .await?;
    Ok(Json(MarkDeliveredResponse { success: true, note }))
}
