//! # Repository Module
//!
//! Database repository implementations for Stockline.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  HTTP handler                                                           │
//! │       │                                                                 │
//! │       │  db.purchases().receive_items(&request)                         │
//! │       ▼                                                                 │
//! │  PurchaseOrderRepository                                                │
//! │  ├── load header + items             (inside one transaction)           │
//! │  ├── stockline_core::purchase::plan_receipt   ← rules live in core      │
//! │  ├── conditional UPDATE per item     ← bound re-checked by SQLite       │
//! │  └── inventory::apply_movement       ← ledger line + transaction        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT (or ROLLBACK on any error: nothing partial is visible)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CatalogRepository`] - Products, stores, customers, suppliers, riders
//! - [`InventoryRepository`] - Ledger, opening balances, snapshots, summary
//! - [`PurchaseOrderRepository`] - Purchase orders and receiving
//! - [`SalesOrderRepository`] - Sales order lifecycle and stock reversal
//! - [`DeliveryNoteRepository`] - Delivery notes and shipment
//! - [`InvoiceRepository`] - Invoices and payments
//! - [`CreditNoteRepository`] - Credit notes against invoices
//! - [`StockTakeRepository`] - Physical counts and reconciliation

pub mod catalog;
pub mod credit;
pub mod delivery;
pub mod inventory;
pub mod invoice;
pub mod purchase;
pub mod sales;
pub mod stock_take;

#[cfg(test)]
pub(crate) mod test_support;

pub use catalog::CatalogRepository;
pub use credit::CreditNoteRepository;
pub use delivery::DeliveryNoteRepository;
pub use inventory::InventoryRepository;
pub use invoice::InvoiceRepository;
pub use purchase::PurchaseOrderRepository;
pub use sales::SalesOrderRepository;
pub use stock_take::StockTakeRepository;

use chrono::NaiveDate;
use sqlx::SqliteConnection;
use stockline_core::ValidationError;
use uuid::Uuid;

use crate::error::DbResult;

/// Generates a new UUID v4 for entity IDs.
pub(crate) fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Human-facing document number: `PO-20240301-3F2A9C1B`.
pub(crate) fn document_number(prefix: &str, date: NaiveDate) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("{}-{}-{}", prefix, date.format("%Y%m%d"), suffix)
}

/// Rejects a request that names a row which does not exist.
///
/// `table` is always a literal from this crate, never user input.
pub(crate) async fn ensure_exists(
    conn: &mut SqliteConnection,
    table: &'static str,
    field: &str,
    id: &str,
) -> DbResult<()> {
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", table);
    let exists: bool = sqlx::query_scalar(&sql).bind(id).fetch_one(&mut *conn).await?;

    if exists {
        Ok(())
    } else {
        Err(ValidationError::UnknownReference {
            field: field.to_string(),
            value: id.to_string(),
        }
        .into())
    }
}
