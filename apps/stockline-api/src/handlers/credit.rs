use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use stockline_core::credit::{CreditNote, CreditNoteDetail, NewCreditNote};

use super::found;
use crate::error::ApiResult;
use crate::AppState;

pub async fn list_for_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> ApiResult<Json<Vec<CreditNote>>> {
    Ok(Json(state.db.credit_notes().list_for_invoice(&invoice_id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<NewCreditNote>,
) -> ApiResult<(StatusCode, Json<CreditNoteDetail>)> {
    let note = state.db.credit_notes().create(&body).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<CreditNoteDetail>> {
    let note = state.db.credit_notes().get(&id).await?;
    Ok(Json(found(note, "CreditNote", &id)?))
}
