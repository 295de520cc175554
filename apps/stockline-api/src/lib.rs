//! # Stockline API
//!
//! HTTP/JSON surface over [`stockline_db`] for the operations console.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockline API                                    │
//! │                                                                         │
//! │  Console ───► axum Router ───► handlers::* ───► Database repositories   │
//! │                   │                                  │                  │
//! │               TraceLayer                      one SQLite tx per call    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Handlers hold no business rules: they decode the request, call one
//! repository operation and encode its result or an [`error::ApiError`].

pub mod config;
pub mod error;
pub mod handlers;

use axum::routing::{get, post, put};
use axum::Router;
use stockline_db::Database;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        AppState { db }
    }
}

/// Builds the full router.
pub fn build_router(state: AppState) -> Router {
    use handlers::{credit, delivery, health, inventory, invoice, master, purchase, sales, stock_take};

    let api = Router::new()
        // Master data
        .route("/products", get(master::list_products).post(master::create_product))
        .route("/products/:id", get(master::get_product).delete(master::deactivate_product))
        .route("/stores", get(master::list_stores).post(master::create_store))
        .route("/stores/:id", get(master::get_store))
        .route("/customers", get(master::list_customers).post(master::create_customer))
        .route("/customers/:id", get(master::get_customer))
        .route("/suppliers", get(master::list_suppliers).post(master::create_supplier))
        .route("/suppliers/:id", get(master::get_supplier))
        .route("/riders", get(master::list_riders).post(master::create_rider))
        .route("/riders/:id", get(master::get_rider))
        // Inventory ledger
        .route("/inventory/adjust", post(inventory::adjust))
        .route("/inventory/snapshot", get(inventory::snapshot))
        .route("/inventory/transactions", get(inventory::transactions))
        .route("/stores/:id/inventory", get(inventory::store_lines))
        .route("/stock-summary", get(inventory::stock_summary))
        .route(
            "/opening-quantities",
            get(inventory::opening_balances).post(inventory::save_opening_quantities),
        )
        // Purchasing
        .route("/purchase-orders", get(purchase::list).post(purchase::create))
        .route("/purchase-orders/:id", get(purchase::get))
        .route("/purchase-orders/:id/items", put(purchase::replace_items))
        .route("/purchase-orders/:id/send", post(purchase::send))
        .route("/purchase-orders/:id/cancel", post(purchase::cancel))
        .route("/purchase-orders/:id/receipts", get(purchase::receipts))
        .route("/receive-items", post(purchase::receive_items))
        // Sales
        .route("/sales-orders", get(sales::list).post(sales::create))
        .route("/sales-orders/:id", get(sales::get))
        .route("/sales-orders/:id/approve", post(sales::approve))
        .route("/sales-orders/:id/decline", post(sales::decline))
        .route("/sales-orders/:id/dispatch", post(sales::dispatch))
        .route("/sales-orders/:id/close-short", post(sales::close_short))
        .route("/sales-orders/:id/cancel", post(sales::cancel))
        .route("/sales-orders/:id/delivery-notes", get(delivery::list_for_order))
        .route("/sales-orders/:id/invoice", post(invoice::convert_to_invoice))
        .route("/assign-rider", post(sales::assign_rider))
        .route("/receive-back-to-stock", post(sales::receive_back_to_stock))
        // Delivery
        .route("/delivery-notes", post(delivery::create))
        .route("/delivery-notes/:id", get(delivery::get))
        .route("/delivery-notes/:id/prepare", post(delivery::prepare))
        .route("/delivery-notes/:id/dispatch", post(delivery::dispatch))
        .route("/delivery-notes/:id/cancel", post(delivery::cancel))
        .route("/mark-delivered", post(delivery::mark_delivered))
        // Billing
        .route("/invoices", get(invoice::list))
        .route("/invoices/:id", get(invoice::get))
        .route("/invoices/:id/payments", post(invoice::record_payment))
        .route("/invoices/:id/credit-notes", get(credit::list_for_invoice))
        .route("/credit-notes", post(credit::create))
        .route("/credit-notes/:id", get(credit::get))
        // Stock takes
        .route("/stock-take", post(stock_take::post_stock_take))
        .route("/stock-takes/:id", get(stock_take::get))
        .route("/stores/:id/stock-takes", get(stock_take::list_for_store));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
