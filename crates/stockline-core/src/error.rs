//! # Error Types
//!
//! Domain-specific error types for stockline-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  stockline-core errors (this file)                                      │
//! │  ├── CoreError        - Ledger and lifecycle rule violations            │
//! │  └── ValidationError  - Input shape/range failures                      │
//! │                                                                         │
//! │  stockline-db errors (separate crate)                                   │
//! │  └── DbError          - Persistence failures, lock contention           │
//! │                                                                         │
//! │  stockline-api errors (app)                                             │
//! │  └── ApiError         - What the console sees (code + message)          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Console       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant names the product/store/item it concerns so the caller can
//! act on it without re-querying.

use thiserror::Error;

use crate::ledger::StockKey;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A receive line asks for a non-positive quantity or more than remains
    /// outstanding on the purchase order item.
    ///
    /// ## User Workflow
    /// ```text
    /// PO item: ordered 100, received 60
    ///      │
    ///      ▼
    /// receive 50 for the same product
    ///      │
    ///      ▼
    /// InvalidReceivingQuantity { requested: 50, remaining: 40 }
    /// ```
    #[error(
        "Invalid receiving quantity for product {product_id} on PO {purchase_order_id}: \
         requested {requested}, remaining {remaining}"
    )]
    InvalidReceivingQuantity {
        purchase_order_id: String,
        product_id: String,
        requested: i64,
        remaining: i64,
    },

    /// Shipping/crediting more than remains on an order or invoice item.
    #[error("Quantity exceeded for {entity} item {item_id}: requested {requested}, remaining {remaining}")]
    QuantityExceeded {
        entity: String,
        item_id: String,
        requested: i64,
        remaining: i64,
    },

    /// The document is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Receiving against a `draft` PO
    /// - Assigning a rider outside `my_status = 1`
    /// - Editing items on a sent PO
    #[error("{entity} {id} cannot go from {from} to {to}")]
    InvalidStateTransition {
        entity: String,
        id: String,
        from: String,
        to: String,
    },

    /// One or more (store, product) pairs already carry an opening balance.
    #[error("Opening balance already recorded for {} store/product pair(s)", duplicates.len())]
    DuplicateOpeningBalance { duplicates: Vec<StockKey> },

    /// The adjustment would drive stock below zero without an override.
    #[error(
        "Negative inventory for product {product_id} in store {store_id}: \
         on hand {on_hand}, delta {delta}"
    )]
    NegativeInventory {
        store_id: String,
        product_id: String,
        on_hand: i64,
        delta: i64,
    },

    /// Explicit short-closing of an order is disabled by policy.
    #[error("Partial delivery closure is not allowed for sales order {order_id}")]
    PartialCloseNotAllowed { order_id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates an InvalidStateTransition error from any two debuggable states.
    pub fn transition(
        entity: impl Into<String>,
        id: impl Into<String>,
        from: impl std::fmt::Debug,
        to: impl std::fmt::Debug,
    ) -> Self {
        CoreError::InvalidStateTransition {
            entity: entity.into(),
            id: id.into(),
            from: format!("{:?}", from),
            to: format!("{:?}", to),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any business rule runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be zero.
    #[error("{field} must not be zero")]
    MustBeNonZero { field: String },

    /// Invalid format (e.g., invalid UUID, invalid code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value within one request (e.g., the same product twice).
    #[error("{field} '{value}' appears more than once")]
    Duplicate { field: String, value: String },

    /// Reference to an entity that does not exist (e.g., unknown store).
    #[error("Unknown {field}: {value}")]
    UnknownReference { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::NegativeInventory {
            store_id: "S1".to_string(),
            product_id: "P1".to_string(),
            on_hand: 3,
            delta: -5,
        };
        assert_eq!(
            err.to_string(),
            "Negative inventory for product P1 in store S1: on hand 3, delta -5"
        );

        let err = CoreError::transition(
            "PurchaseOrder",
            "po-1",
            crate::purchase::PurchaseOrderStatus::Draft,
            crate::purchase::PurchaseOrderStatus::Received,
        );
        assert_eq!(err.to_string(), "PurchaseOrder po-1 cannot go from Draft to Received");
    }

    #[test]
    fn test_duplicate_opening_message_counts_pairs() {
        let err = CoreError::DuplicateOpeningBalance {
            duplicates: vec![StockKey::new("S1", "P1"), StockKey::new("S2", "P1")],
        };
        assert_eq!(
            err.to_string(),
            "Opening balance already recorded for 2 store/product pair(s)"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "code".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
