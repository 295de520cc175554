//! Invoices and payments.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use stockline_core::invoice::{Invoice, InvoiceDetail, InvoiceStatus, RecordPaymentRequest};

use super::{found, ActorBody};
use crate::error::ApiResult;
use crate::AppState;

/// Bills a completed sales order.
pub async fn convert_to_invoice(
    State(state): State<AppState>,
    Path(sales_order_id): Path<String>,
    Json(body): Json<ActorBody>,
) -> ApiResult<(StatusCode, Json<InvoiceDetail>)> {
    let invoice = state
        .db
        .invoices()
        .convert_to_invoice(&sales_order_id, &body.actor_id)
        .await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

#[derive(Debug, Deserialize)]
pub struct StatusFilter {
    pub status: Option<InvoiceStatus>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<StatusFilter>,
) -> ApiResult<Json<Vec<Invoice>>> {
    Ok(Json(state.db.invoices().list(filter.status).await?))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<InvoiceDetail>> {
    let invoice = state.db.invoices().get(&id).await?;
    Ok(Json(found(invoice, "Invoice", &id)?))
}

pub async fn record_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RecordPaymentRequest>,
) -> ApiResult<Json<InvoiceDetail>> {
    Ok(Json(state.db.invoices().record_payment(&id, &body).await?))
}
