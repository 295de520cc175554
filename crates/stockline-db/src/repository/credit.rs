//! # Credit Note Repository
//!
//! Credit notes reduce what a customer owes on an invoice. They never move
//! stock.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::repository::invoice::{fetch_invoice, fetch_invoice_items};
use crate::repository::{document_number, generate_id};
use stockline_core::credit::{plan_credit_note, CreditNote, CreditNoteDetail, CreditNoteItem, NewCreditNote};
use stockline_core::tax::document_totals;

/// Repository for credit notes.
#[derive(Debug, Clone)]
pub struct CreditNoteRepository {
    pool: SqlitePool,
}

impl CreditNoteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CreditNoteRepository { pool }
    }

    /// Issues a credit note against an invoice.
    ///
    /// ## Errors
    /// `QuantityExceeded` when the cumulative credited quantity of a product
    /// would pass what was invoiced.
    pub async fn create(&self, request: &NewCreditNote) -> DbResult<CreditNoteDetail> {
        let mut tx = self.pool.begin().await?;

        let invoice = fetch_invoice(&mut tx, &request.original_invoice_id).await?;
        let invoice_items = fetch_invoice_items(&mut tx, &invoice.id).await?;
        let credited = already_credited(&mut tx, &invoice.id).await?;
        let plan = plan_credit_note(&invoice, &invoice_items, &credited, request)?;
        let totals = document_totals(plan.iter().map(|l| &l.pricing))?;

        let now = Utc::now();
        let credit_note_id = generate_id();

        sqlx::query(
            r#"
            INSERT INTO credit_notes (
                id, credit_note_number, customer_id, original_invoice_id, credit_date, reason,
                subtotal_cents, tax_cents, total_cents, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&credit_note_id)
        .bind(document_number("CN", request.credit_date))
        .bind(&request.customer_id)
        .bind(&invoice.id)
        .bind(request.credit_date)
        .bind(request.reason.trim())
        .bind(totals.subtotal_cents)
        .bind(totals.tax_cents)
        .bind(totals.total_cents)
        .bind(&request.actor_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for line in &plan {
            sqlx::query(
                r#"
                INSERT INTO credit_note_items (
                    id, credit_note_id, invoice_id, product_id, quantity, unit_price_cents,
                    tax_type, net_price_cents, tax_amount_cents, total_price_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )
            .bind(generate_id())
            .bind(&credit_note_id)
            .bind(&invoice.id)
            .bind(&line.product_id)
            .bind(line.quantity)
            .bind(line.unit_price_cents)
            .bind(line.tax_type)
            .bind(line.pricing.net_price_cents)
            .bind(line.pricing.tax_amount_cents)
            .bind(line.pricing.total_price_cents)
            .execute(&mut *tx)
            .await?;
        }

        let detail = load_detail(&mut tx, &credit_note_id).await?;
        tx.commit().await?;

        info!(
            id = %detail.credit_note.id,
            number = %detail.credit_note.credit_note_number,
            invoice_id = %invoice.id,
            total_cents = totals.total_cents,
            actor_id = %request.actor_id,
            "Credit note issued"
        );
        Ok(detail)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<CreditNoteDetail>> {
        let mut conn = self.pool.acquire().await?;
        match load_detail(&mut conn, id).await {
            Ok(detail) => Ok(Some(detail)),
            Err(DbError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn list_for_invoice(&self, invoice_id: &str) -> DbResult<Vec<CreditNote>> {
        let notes = sqlx::query_as::<_, CreditNote>(
            "SELECT * FROM credit_notes WHERE original_invoice_id = ?1 ORDER BY rowid",
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(notes)
    }
}

/// Product id → quantity credited so far on an invoice.
async fn already_credited(conn: &mut SqliteConnection, invoice_id: &str) -> DbResult<HashMap<String, i64>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT product_id, SUM(quantity) FROM credit_note_items
        WHERE invoice_id = ?1
        GROUP BY product_id
        "#,
    )
    .bind(invoice_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().collect())
}

async fn load_detail(conn: &mut SqliteConnection, id: &str) -> DbResult<CreditNoteDetail> {
    let credit_note = sqlx::query_as::<_, CreditNote>("SELECT * FROM credit_notes WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("CreditNote", id))?;
    let items = sqlx::query_as::<_, CreditNoteItem>(
        "SELECT * FROM credit_note_items WHERE credit_note_id = ?1 ORDER BY rowid",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(CreditNoteDetail { credit_note, items })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{today, world, ACTOR};
    use stockline_core::credit::CreditLineInput;
    use stockline_core::invoice::Invoice;
    use stockline_core::CoreError;

    fn credit(invoice: &Invoice, product_id: &str, quantity: i64) -> NewCreditNote {
        NewCreditNote {
            customer_id: invoice.customer_id.clone(),
            original_invoice_id: invoice.id.clone(),
            credit_date: today(),
            reason: "Damaged in transit".to_string(),
            items: vec![CreditLineInput {
                invoice_id: invoice.id.clone(),
                product_id: product_id.to_string(),
                quantity,
                unit_price_cents: None,
            }],
            actor_id: ACTOR.to_string(),
        }
    }

    #[tokio::test]
    async fn test_cumulative_credit_bounded_by_invoiced_quantity() {
        let w = world().await;
        let order = w.approved_order(6).await;
        let invoice = w
            .db
            .invoices()
            .convert_to_invoice(&order.order.id, ACTOR)
            .await
            .unwrap()
            .invoice;
        let credits = w.db.credit_notes();

        let first = credits.create(&credit(&invoice, &w.product.id, 4)).await.unwrap();
        assert!(first.credit_note.credit_note_number.starts_with("CN-"));
        assert_eq!(first.items[0].unit_price_cents, 1_500);
        assert!(first.credit_note.total_cents > 0);

        let err = credits.create(&credit(&invoice, &w.product.id, 3)).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::QuantityExceeded { requested: 3, remaining: 2, .. })
        ));

        credits.create(&credit(&invoice, &w.product.id, 2)).await.unwrap();
        assert_eq!(credits.list_for_invoice(&invoice.id).await.unwrap().len(), 2);

        let not_invoiced = credits.create(&credit(&invoice, &w.other_product.id, 1)).await.unwrap_err();
        assert!(matches!(not_invoiced, DbError::Domain(CoreError::Validation(_))));

        assert_eq!(w.on_hand(&w.store, &w.product).await, 0);
    }
}
