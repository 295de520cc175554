//! # stockline-db: Persistence Layer for Stockline
//!
//! SQLite storage for the multi-store inventory ledger and the documents that
//! move it, using sqlx for async access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockline Data Flow                              │
//! │                                                                         │
//! │  HTTP handler (POST /api/mark-delivered)                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                   stockline-db (THIS CRATE)                     │    │
//! │  │                                                                 │    │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐   │    │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │   │    │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │   │    │
//! │  │   │               │    │ Inventory      │    │              │   │    │
//! │  │   │ SqlitePool    │◄───│ Purchase/Sales │    │ 001_init.sql │   │    │
//! │  │   │ LedgerPolicy  │    │ Delivery/...   │    │              │   │    │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘   │    │
//! │  │                                                                 │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                     SQLite Database (WAL)                       │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`retry`] - Single retry on lock contention
//! - [`repository`] - One repository per document family
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stockline_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/stockline.db")).await?;
//!
//! let outcome = db.purchases().receive_items(&request).await?;
//! let summary = db.inventory().stock_summary().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod retry;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::{
    CatalogRepository, CreditNoteRepository, DeliveryNoteRepository, InventoryRepository,
    InvoiceRepository, PurchaseOrderRepository, SalesOrderRepository, StockTakeRepository,
};
