//! # Invoice Repository
//!
//! Converts sales orders into invoices and records payments against them.
//! Nothing here touches the ledger.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::{document_number, generate_id};
use crate::repository::sales::{self as orders, fetch_items, fetch_order, open_delivery_notes};
use stockline_core::invoice::{
    apply_payment, Invoice, InvoiceDetail, InvoiceItem, InvoiceLine, InvoiceStatus, Payment,
    RecordPaymentRequest,
};
use stockline_core::sales::{self, SalesOrderStatus};
use stockline_core::validation::validate_actor;

/// Repository for invoices and payments.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Raises the single invoice for a sales order and moves the order to
    /// `in_payment`.
    ///
    /// ## Errors
    /// - `InvalidStateTransition` if the order is cancelled, declined,
    ///   already billed, or still has an open delivery note
    /// - `UniqueViolation` if an invoice already exists for the order
    pub async fn convert_to_invoice(&self, sales_order_id: &str, actor_id: &str) -> DbResult<InvoiceDetail> {
        validate_actor(actor_id)?;

        let mut tx = self.pool.begin().await?;
        let order = fetch_order(&mut tx, sales_order_id).await?;
        let open_notes = open_delivery_notes(&mut tx, sales_order_id).await?;
        sales::ensure_invoiceable(&order, open_notes)?;

        let existing: Option<String> =
            sqlx::query_scalar("SELECT invoice_number FROM invoices WHERE sales_order_id = ?1")
                .bind(sales_order_id)
                .fetch_optional(&mut *tx)
                .await?;
        if let Some(number) = existing {
            return Err(DbError::duplicate("invoice for sales order", number));
        }

        let items = fetch_items(&mut tx, sales_order_id).await?;
        let now = Utc::now();
        let invoice_id = generate_id();

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, invoice_number, sales_order_id, customer_id, invoice_date, pricing_mode,
                subtotal_cents, tax_cents, total_cents, amount_paid_cents, status,
                created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10, ?11, ?12)
            "#,
        )
        .bind(&invoice_id)
        .bind(document_number("INV", now.date_naive()))
        .bind(&order.id)
        .bind(&order.customer_id)
        .bind(now.date_naive())
        .bind(order.pricing_mode)
        .bind(order.subtotal_cents)
        .bind(order.tax_cents)
        .bind(order.total_cents)
        .bind(InvoiceStatus::Unpaid)
        .bind(actor_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for line in items.iter().map(InvoiceLine::from) {
            sqlx::query(
                r#"
                INSERT INTO invoice_items (
                    id, invoice_id, product_id, quantity, unit_price_cents, tax_type,
                    net_price_cents, tax_amount_cents, total_price_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(generate_id())
            .bind(&invoice_id)
            .bind(&line.product_id)
            .bind(line.quantity)
            .bind(line.unit_price_cents)
            .bind(line.tax_type)
            .bind(line.net_price_cents)
            .bind(line.tax_amount_cents)
            .bind(line.total_price_cents)
            .execute(&mut *tx)
            .await?;
        }

        orders::set_progress(&mut tx, &order, order.my_status, SalesOrderStatus::InPayment).await?;

        let detail = load_detail(&mut tx, &invoice_id).await?;
        tx.commit().await?;

        info!(
            id = %detail.invoice.id,
            number = %detail.invoice.invoice_number,
            sales_order_id = %sales_order_id,
            total_cents = detail.invoice.total_cents,
            actor_id = %actor_id,
            "Sales order converted to invoice"
        );
        Ok(detail)
    }

    /// Records a payment. Settling the balance marks the invoice and its
    /// order paid.
    pub async fn record_payment(
        &self,
        invoice_id: &str,
        request: &RecordPaymentRequest,
    ) -> DbResult<InvoiceDetail> {
        validate_actor(&request.actor_id)?;

        let mut tx = self.pool.begin().await?;
        let invoice = fetch_invoice(&mut tx, invoice_id).await?;
        let next = apply_payment(&invoice, request.amount_cents)?;

        let result = sqlx::query(
            r#"
            UPDATE invoices SET amount_paid_cents = amount_paid_cents + ?2, status = ?3
            WHERE id = ?1 AND amount_paid_cents = ?4
            "#,
        )
        .bind(invoice_id)
        .bind(request.amount_cents)
        .bind(next)
        .bind(invoice.amount_paid_cents)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::ConcurrencyConflict(format!(
                "invoice {} paid concurrently",
                invoice_id
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO payments (id, invoice_id, amount_cents, reference, recorded_by, paid_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(generate_id())
        .bind(invoice_id)
        .bind(request.amount_cents)
        .bind(&request.reference)
        .bind(&request.actor_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        if next == InvoiceStatus::Paid {
            let order = fetch_order(&mut tx, &invoice.sales_order_id).await?;
            if order.status == SalesOrderStatus::InPayment {
                orders::set_progress(&mut tx, &order, order.my_status, SalesOrderStatus::Paid).await?;
            }
        }

        let detail = load_detail(&mut tx, invoice_id).await?;
        tx.commit().await?;

        info!(
            id = %invoice_id,
            amount_cents = request.amount_cents,
            outstanding_cents = detail.invoice.outstanding_cents(),
            status = ?next,
            actor_id = %request.actor_id,
            "Payment recorded"
        );
        Ok(detail)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<InvoiceDetail>> {
        let mut conn = self.pool.acquire().await?;
        match load_detail(&mut conn, id).await {
            Ok(detail) => Ok(Some(detail)),
            Err(DbError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn get_by_order(&self, sales_order_id: &str) -> DbResult<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE sales_order_id = ?1")
            .bind(sales_order_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(invoice)
    }

    /// Lists invoices, newest first, optionally by status.
    pub async fn list(&self, status: Option<InvoiceStatus>) -> DbResult<Vec<Invoice>> {
        let invoices = match status {
            Some(status) => {
                sqlx::query_as::<_, Invoice>(
                    "SELECT * FROM invoices WHERE status = ?1 ORDER BY created_at DESC",
                )
                .bind(status)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Invoice>("SELECT * FROM invoices ORDER BY created_at DESC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        debug!(count = invoices.len(), "Listed invoices");
        Ok(invoices)
    }
}

pub(crate) async fn fetch_invoice(conn: &mut SqliteConnection, id: &str) -> DbResult<Invoice> {
    sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Invoice", id))
}

pub(crate) async fn fetch_invoice_items(
    conn: &mut SqliteConnection,
    invoice_id: &str,
) -> DbResult<Vec<InvoiceItem>> {
    let items = sqlx::query_as::<_, InvoiceItem>(
        "SELECT * FROM invoice_items WHERE invoice_id = ?1 ORDER BY rowid",
    )
    .bind(invoice_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(items)
}

async fn load_detail(conn: &mut SqliteConnection, id: &str) -> DbResult<InvoiceDetail> {
    let invoice = fetch_invoice(conn, id).await?;
    let items = fetch_invoice_items(conn, id).await?;
    let payments = sqlx::query_as::<_, Payment>(
        "SELECT * FROM payments WHERE invoice_id = ?1 ORDER BY rowid",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(InvoiceDetail { invoice, items, payments })
}

// =============================================================================
// Unit Tests
// =============================================================================
