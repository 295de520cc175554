//! # API Error Type
//!
//! Unified error type for HTTP handlers.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Stockline                              │
//! │                                                                         │
//! │  Console                      Rust Backend                              │
//! │  ───────                      ────────────                              │
//! │                                                                         │
//! │  POST /api/mark-delivered                                               │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐   │
//! │  │  Handler → Result<Json<T>, ApiError>                             │   │
//! │  │         │                                                        │   │
//! │  │  DbError::Domain(CoreError::NegativeInventory {..}) ──┐          │   │
//! │  │  DbError::ConcurrencyConflict(..) ────────────────────┤          │   │
//! │  │  DbError::QueryFailed(..) ────────────────────────────┤          │   │
//! │  │                                                       ▼          │   │
//! │  │                                   ApiError { status, code, ... } │   │
//! │  └──────────────────────────────────────────────────────────────────┘   │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  422 { "success": false, "code": "NEGATIVE_INVENTORY",                  │
//! │        "message": "...", "details": { "storeId": .., "onHand": 3 } }    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use stockline_core::{CoreError, StockKey};
use stockline_db::DbError;

/// API error returned from handlers.
///
/// ## Serialization
/// ```json
/// {
///   "success": false,
///   "code": "QUANTITY_EXCEEDED",
///   "message": "Quantity exceeded for SalesOrderItem item ...: requested 3, remaining 2",
///   "details": { "itemId": "...", "requested": 3, "remaining": 2 }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<Value>,
    /// Only set for rejected opening balance batches.
    pub duplicate_items: Option<Vec<StockKey>>,
}

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// Receive line outside `0 < q <= remaining` (422)
    InvalidReceivingQuantity,

    /// Ship/credit beyond the remaining quantity (422)
    QuantityExceeded,

    /// Operation not allowed from the current status (409)
    InvalidStateTransition,

    /// Opening balance already recorded (409)
    DuplicateOpeningBalance,

    /// Stock would drop below zero (422)
    NegativeInventory,

    /// Short-closing disabled by policy (409)
    PartialCloseNotAllowed,

    /// Lock contention that survived the retry (409)
    ConcurrencyConflict,

    /// Unique key already taken (409)
    Conflict,

    /// Database operation failed (500)
    DatabaseError,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    success: bool,
    code: ErrorCode,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duplicate_items: Option<&'a [StockKey]>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            code,
            message: message.into(),
            details: None,
            duplicate_items: None,
        }
    }

    fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(
            StatusCode::NOT_FOUND,
            ErrorCode::NotFound,
            format!("{} not found: {}", resource, id),
        )
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, ErrorCode::ValidationError, message)
    }
}

/// Converts domain errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            CoreError::InvalidReceivingQuantity {
                purchase_order_id,
                product_id,
                requested,
                remaining,
            } => ApiError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorCode::InvalidReceivingQuantity,
                message,
            )
            .with_details(json!({
                "purchaseOrderId": purchase_order_id,
                "productId": product_id,
                "requested": requested,
                "remaining": remaining,
            })),
            CoreError::QuantityExceeded {
                entity,
                item_id,
                requested,
                remaining,
            } => ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::QuantityExceeded, message)
                .with_details(json!({
                    "entity": entity,
                    "itemId": item_id,
                    "requested": requested,
                    "remaining": remaining,
                })),
            CoreError::InvalidStateTransition { entity, id, from, to } => {
                ApiError::new(StatusCode::CONFLICT, ErrorCode::InvalidStateTransition, message)
                    .with_details(json!({ "entity": entity, "id": id, "from": from, "to": to }))
            }
            CoreError::DuplicateOpeningBalance { duplicates } => {
                let mut api = ApiError::new(
                    StatusCode::CONFLICT,
                    ErrorCode::DuplicateOpeningBalance,
                    message,
                );
                api.duplicate_items = Some(duplicates);
                api
            }
            CoreError::NegativeInventory {
                store_id,
                product_id,
                on_hand,
                delta,
            } => ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::NegativeInventory, message)
                .with_details(json!({
                    "storeId": store_id,
                    "productId": product_id,
                    "onHand": on_hand,
                    "delta": delta,
                })),
            CoreError::PartialCloseNotAllowed { order_id } => {
                ApiError::new(StatusCode::CONFLICT, ErrorCode::PartialCloseNotAllowed, message)
                    .with_details(json!({ "orderId": order_id }))
            }
            CoreError::Validation(e) => ApiError::validation(e.to_string()),
        }
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Domain(core) => core.into(),
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                StatusCode::CONFLICT,
                ErrorCode::Conflict,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::ConcurrencyConflict(reason) => {
                tracing::warn!(reason = %reason, "Concurrency conflict surfaced to client");
                ApiError::new(
                    StatusCode::CONFLICT,
                    ErrorCode::ConcurrencyConflict,
                    "Another operation changed the same stock; retry the request",
                )
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::validation("Invalid reference")
            }
            DbError::ConstraintViolation { message } => {
                tracing::error!("Constraint violation: {}", message);
                ApiError::validation("Request violates a data constraint")
            }
            e @ (DbError::ConnectionFailed(_) | DbError::MigrationFailed(_) | DbError::PoolExhausted) => {
                tracing::error!("Database unavailable: {}", e);
                ApiError::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorCode::DatabaseError,
                    "Database unavailable",
                )
            }
            e @ (DbError::QueryFailed(_) | DbError::Internal(_)) => {
                // Log the actual error but return a generic message
                tracing::error!("Database operation failed: {}", e);
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DatabaseError,
                    "Database operation failed",
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            code: self.code,
            message: &self.message,
            details: self.details.as_ref(),
            duplicate_items: self.duplicate_items.as_deref(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_inventory_maps_to_422_with_details() {
        let err: ApiError = DbError::Domain(CoreError::NegativeInventory {
            store_id: "s1".to_string(),
            product_id: "p1".to_string(),
            on_hand: 3,
            delta: -5,
        })
        .into();

        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code, ErrorCode::NegativeInventory);
        assert_eq!(err.details.unwrap()["onHand"], 3);
    }

    #[test]
    fn test_duplicate_opening_keeps_pairs() {
        let err: ApiError = CoreError::DuplicateOpeningBalance {
            duplicates: vec![StockKey::new("s1", "p1")],
        }
        .into();

        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.duplicate_items.unwrap().len(), 1);
    }

    #[test]
    fn test_query_failure_hides_detail() {
        let err: ApiError = DbError::QueryFailed("no such column: secret".to_string()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("secret"));
    }
}
