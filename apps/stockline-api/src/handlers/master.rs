//! Master data: products, stores, customers, suppliers, riders.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use stockline_core::{Customer, NewParty, NewProduct, NewStore, Product, Rider, Store, Supplier};

use super::found;
use crate::error::ApiResult;
use crate::AppState;

pub async fn create_product(
    State(state): State<AppState>,
    Json(body): Json<NewProduct>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    let product = state.db.catalog().create_product(&body).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn get_product(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Product>> {
    let product = state.db.catalog().get_product(&id).await?;
    Ok(Json(found(product, "Product", &id)?))
}

pub async fn list_products(State(state): State<AppState>) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(state.db.catalog().list_products().await?))
}

pub async fn deactivate_product(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    state.db.catalog().deactivate_product(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_store(
    State(state): State<AppState>,
    Json(body): Json<NewStore>,
) -> ApiResult<(StatusCode, Json<Store>)> {
    let store = state.db.catalog().create_store(&body).await?;
    Ok((StatusCode::CREATED, Json(store)))
}

pub async fn get_store(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Store>> {
    let store = state.db.catalog().get_store(&id).await?;
    Ok(Json(found(store, "Store", &id)?))
}

pub async fn list_stores(State(state): State<AppState>) -> ApiResult<Json<Vec<Store>>> {
    Ok(Json(state.db.catalog().list_stores().await?))
}

pub async fn create_customer(
    State(state): State<AppState>,
    Json(body): Json<NewParty>,
) -> ApiResult<(StatusCode, Json<Customer>)> {
    let customer = state.db.catalog().create_customer(&body).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn get_customer(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Customer>> {
    let customer = state.db.catalog().get_customer(&id).await?;
    Ok(Json(found(customer, "Customer", &id)?))
}

pub async fn list_customers(State(state): State<AppState>) -> ApiResult<Json<Vec<Customer>>> {
    Ok(Json(state.db.catalog().list_customers().await?))
}

pub async fn create_supplier(
    State(state): State<AppState>,
    Json(body): Json<NewParty>,
) -> ApiResult<(StatusCode, Json<Supplier>)> {
    let supplier = state.db.catalog().create_supplier(&body).await?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

pub async fn get_supplier(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Supplier>> {
    let supplier = state.db.catalog().get_supplier(&id).await?;
    Ok(Json(found(supplier, "Supplier", &id)?))
}

pub async fn list_suppliers(State(state): State<AppState>) -> ApiResult<Json<Vec<Supplier>>> {
    Ok(Json(state.db.catalog().list_suppliers().await?))
}

pub async fn create_rider(
    State(state): State<AppState>,
    Json(body): Json<NewParty>,
) -> ApiResult<(StatusCode, Json<Rider>)> {
    let rider = state.db.catalog().create_rider(&body).await?;
    Ok((StatusCode::CREATED, Json(rider)))
}

pub async fn get_rider(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Rider>> {
    let rider = state.db.catalog().get_rider(&id).await?;
    Ok(Json(found(rider, "Rider", &id)?))
}

pub async fn list_riders(State(state): State<AppState>) -> ApiResult<Json<Vec<Rider>>> {
    Ok(Json(state.db.catalog().list_riders().await?))
}
