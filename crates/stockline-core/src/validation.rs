//! # Validation Module
//!
//! Input validation for master data and ledger requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP handler (axum)                                           │
//! │  └── Shape validation (JSON deserialization)                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                   │
//! │  ├── Codes, names, actor ids                                            │
//! │  └── Quantity / price ranges, duplicate lines                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  ├── CHECK (received_quantity <= quantity) and friends                  │
//! │  ├── UNIQUE constraints                                                 │
//! │  └── Foreign key constraints                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::tax::OrderLineInput;
use crate::{MAX_LINE_QUANTITY, MAX_UNIT_PRICE_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a business code (product code, store code).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, numbers, hyphens, underscores only
///
/// ## Example
/// ```rust
/// use stockline_core::validation::validate_code;
///
/// assert!(validate_code("code", "SUG-50KG").is_ok());
/// assert!(validate_code("code", "").is_err());
/// assert!(validate_code("code", "has space").is_err());
/// ```
pub fn validate_code(field: &str, code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if code.len() > 50 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 50,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a display name (product, store, party, rider).
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Every mutating call names who performed it.
pub fn validate_actor(actor_id: &str) -> ValidationResult<()> {
    if actor_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "actor_id".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity (ordered, received, shipped, credited).
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY
pub fn validate_quantity(field: &str, qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a quantity that may be zero (opening balances, reorder levels).
pub fn validate_non_negative_quantity(field: &str, qty: i64) -> ValidationResult<()> {
    if !(0..=MAX_LINE_QUANTITY).contains(&qty) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_LINE_QUANTITY,
        });
    }
    Ok(())
}

/// Validates a signed quantity (adjustment deltas, physical counts).
///
/// Same magnitude bound as [`validate_quantity`] in either direction.
pub fn validate_signed_quantity(field: &str, qty: i64) -> ValidationResult<()> {
    if !(-MAX_LINE_QUANTITY..=MAX_LINE_QUANTITY).contains(&qty) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: -MAX_LINE_QUANTITY,
            max: MAX_LINE_QUANTITY,
        });
    }
    Ok(())
}

/// Validates a price in cents.
///
/// ## Example
/// ```rust
/// use stockline_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents("unit_price", 1099).is_ok());
/// assert!(validate_price_cents("unit_price", 0).is_ok());
/// assert!(validate_price_cents("unit_price", -100).is_err());
/// assert!(validate_price_cents("unit_price", i64::MAX / 10).is_err());
/// ```
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_UNIT_PRICE_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_UNIT_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Validates a payment amount in cents.
pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use stockline_core::validation::validate_uuid;
///
/// assert!(validate_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Rejects empty batches.
pub fn validate_not_empty<T>(field: &str, items: &[T]) -> ValidationResult<()> {
    if items.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Rejects a batch that names the same key twice.
///
/// ## Example
/// ```rust
/// use stockline_core::validation::validate_unique;
///
/// assert!(validate_unique("product_id", ["a", "b"]).is_ok());
/// assert!(validate_unique("product_id", ["a", "b", "a"]).is_err());
/// ```
pub fn validate_unique<'a>(
    field: &str,
    keys: impl IntoIterator<Item = &'a str>,
) -> ValidationResult<()> {
    let mut seen = HashSet::new();
    for key in keys {
        if !seen.insert(key) {
            return Err(ValidationError::Duplicate {
                field: field.to_string(),
                value: key.to_string(),
            });
        }
    }
    Ok(())
}

/// Validates the lines of a new purchase or sales order.
///
/// Each product may appear once per order, so receipts and shipments can be
/// addressed by product.
pub fn validate_order_lines(lines: &[OrderLineInput]) -> ValidationResult<()> {
    validate_not_empty("lines", lines)?;
    for line in lines {
        validate_uuid("product_id", &line.product_id)?;
        validate_quantity("quantity", line.quantity)?;
        validate_price_cents("unit_price", line.unit_price_cents)?;
    }
    validate_unique("product_id", lines.iter().map(|l| l.product_id.as_str()))
}

// =============================================================================
// Unit Tests
// =============================================================================
