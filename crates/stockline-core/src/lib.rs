//! # stockline-core: Pure Rules for the Stockline Ledger
//!
//! State machines, quantity arithmetic and validation for order fulfillment
//! and the multi-store inventory ledger. No I/O lives here.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockline Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                Operations Console (browser)                     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ HTTP / JSON                            │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    stockline-api (axum)                         │   │
//! │  │    receive-items, mark-delivered, stock-take, etc.              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    stockline-db (SQLite)                        │   │
//! │  │         transactions, conditional increments, migrations        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ calls                                  │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ stockline-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌──────────┐ ┌─────────┐ ┌──────────┐ ┌────────┐ │   │
//! │  │   │ ledger  │ │ purchase │ │  sales  │ │ delivery │ │ stock  │ │   │
//! │  │   │ replay  │ │ receive  │ │ my_stat │ │  notes   │ │ take   │ │   │
//! │  │   └─────────┘ └──────────┘ └─────────┘ └──────────┘ └────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`ledger`] - Stock keys, movements, replay, stock summary
//! - [`purchase`] - Purchase order lifecycle and receive planning
//! - [`sales`] - Sales order dual status, reversal planning
//! - [`delivery`] - Delivery note progress and quantity bounds
//! - [`invoice`] / [`credit`] - Billing documents (no stock movement)
//! - [`stock_take`] - Count reconciliation
//! - [`opening`] - Opening balance batches
//! - [`tax`] / [`money`] - Line pricing in integer cents
//! - [`policy`] - Deployment policies
//!
//! ## Example Usage
//!
//! ```rust
//! use std::collections::HashMap;
//! use stockline_core::policy::NegativeCountPolicy;
//! use stockline_core::stock_take::{reconcile, StockCount};
//!
//! let ledger = HashMap::from([("B".to_string(), 50)]);
//! let counts = [StockCount { product_id: "B".to_string(), counted_quantity: 45 }];
//!
//! let report = reconcile(&ledger, &counts, NegativeCountPolicy::Reject).unwrap();
//! assert_eq!(report[0].diff, -5);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod credit;
pub mod delivery;
pub mod error;
pub mod invoice;
pub mod ledger;
pub mod money;
pub mod opening;
pub mod policy;
pub mod purchase;
pub mod sales;
pub mod stock_take;
pub mod tax;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use ledger::{MovementReason, StockKey};
pub use money::Money;
pub use policy::LedgerPolicy;
pub use tax::{PricingMode, TaxType};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Largest quantity accepted on a single line.
///
/// Catches typos such as an extra zero on a bulk order long before they reach
/// the ledger.
pub const MAX_LINE_QUANTITY: i64 = 1_000_000;

/// Largest unit price accepted, in cents (one billion in currency units).
///
/// With [`MAX_LINE_QUANTITY`] this keeps a single line total inside `i64`.
pub const MAX_UNIT_PRICE_CENTS: i64 = 100_000_000_000;
