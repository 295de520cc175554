//! # Master Data Types
//!
//! Products, stores, parties and riders referenced by every ledger document.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Master Data                                     │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │     Store       │   │     Rider       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  code (business)│   │  code           │   │  name, phone    │       │
//! │  │  prices, UoM    │   │  name           │   │  is_active      │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                              │
//! │  │    Customer     │   │    Supplier     │                              │
//! │  └─────────────────┘   └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for relations
//! - Business ID: (`code`) - human-readable
//!
//! Stock is never stored on the product: it is derived from the inventory
//! ledger per store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::validation::{
    validate_code, validate_name, validate_non_negative_quantity, validate_price_cents,
};

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1600 bps = 16% (standard VAT).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Standard VAT rate (16%).
    pub const VAT_STANDARD: TaxRate = TaxRate(1600);

    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product the company buys and sells.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Business identifier (e.g., "SUG-50KG").
    pub code: String,

    /// Display name.
    pub name: String,

    /// Unit of measure ("bag", "carton", "kg").
    pub unit_of_measure: String,

    /// Purchase cost in cents.
    pub cost_price_cents: i64,

    /// Selling price in cents.
    pub selling_price_cents: i64,

    /// Total on-hand quantity below which the product should be reordered.
    pub reorder_level: i64,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Store
// =============================================================================

/// A physical location holding stock. Inventory is always scoped to a store.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Store {
    pub id: String,
    pub code: String,
    pub name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Parties
// =============================================================================

/// A customer buying through sales orders.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A supplier receiving purchase orders.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Supplier {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A delivery rider. Assigned to orders and delivery notes, never owns them.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Rider {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Create Requests
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub code: String,
    pub name: String,
    pub unit_of_measure: String,
    pub cost_price_cents: i64,
    pub selling_price_cents: i64,
    #[serde(default)]
    pub reorder_level: i64,
}

impl NewProduct {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_code("code", &self.code)?;
        validate_name("name", &self.name)?;
        validate_name("unit_of_measure", &self.unit_of_measure)?;
        validate_price_cents("cost_price", self.cost_price_cents)?;
        validate_price_cents("selling_price", self.selling_price_cents)?;
        validate_non_negative_quantity("reorder_level", self.reorder_level)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewStore {
    pub code: String,
    pub name: String,
}

impl NewStore {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_code("code", &self.code)?;
        validate_name("name", &self.name)
    }
}

/// Customer, supplier and rider creation share one shape.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewParty {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl NewParty {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name("name", &self.name)?;
        if let Some(email) = self.email.as_deref() {
            if !email.contains('@') {
                return Err(ValidationError::InvalidFormat {
                    field: "email".to_string(),
                    reason: "must contain '@'".to_string(),
                });
            }
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
