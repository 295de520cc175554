//! # Purchase Order Repository
//!
//! Purchase orders, their items, and receiving into a store.
//!
//! ## Receiving Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  receive_items(po, store, [A:60])                                       │
//! │       │                                                                 │
//! │       ▼  BEGIN                                                          │
//! │  load PO + items ──► plan_receipt (status, bounds, duplicates)          │
//! │       │                                                                 │
//! │       ▼  per line                                                       │
//! │  UPDATE purchase_order_items                                            │
//! │     SET received_quantity = received_quantity + 60                      │
//! │   WHERE id = ? AND received_quantity + 60 <= quantity                   │
//! │       │   0 rows → InvalidReceivingQuantity (ROLLBACK)                  │
//! │       ▼                                                                 │
//! │  INSERT inventory_receipts  +  apply_movement(+60, receipt)             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  all items complete? → status = received                                │
//! │       │                                                                 │
//! │       ▼  COMMIT                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::inventory::apply_movement;
use crate::repository::{document_number, ensure_exists, generate_id};
use crate::retry::retry_on_conflict;
use stockline_core::ledger::{Movement, MovementReason};
use stockline_core::purchase::{
    ensure_editable, ensure_sendable, ensure_transition, plan_receipt, status_after_receipt,
    InventoryReceipt, NewPurchaseOrder, PurchaseOrder, PurchaseOrderDetail, PurchaseOrderItem,
    PurchaseOrderStatus, ReceiveItemsRequest, ReceiveOutcome,
};
use stockline_core::tax::{document_totals, price_line, OrderLineInput, PricingMode};
use stockline_core::validation::{validate_actor, validate_order_lines};
use stockline_core::{CoreError, LedgerPolicy, StockKey};

/// Repository for purchase orders and receiving.
#[derive(Debug, Clone)]
pub struct PurchaseOrderRepository {
    pool: SqlitePool,
    policy: LedgerPolicy,
}

impl PurchaseOrderRepository {
    pub fn new(pool: SqlitePool, policy: LedgerPolicy) -> Self {
        PurchaseOrderRepository { pool, policy }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Creates a draft order with priced items.
    pub async fn create(&self, request: &NewPurchaseOrder) -> DbResult<PurchaseOrderDetail> {
        request.validate()?;

        let mut tx = self.pool.begin().await?;
        ensure_exists(&mut *tx, "suppliers", "supplier_id", &request.supplier_id).await?;

        let now = Utc::now();
        let pricing_mode = request.pricing_mode.unwrap_or(self.policy.purchase_pricing);
        let order = PurchaseOrder {
            id: generate_id(),
            order_number: document_number("PO", request.order_date),
            supplier_id: request.supplier_id.clone(),
            order_date: request.order_date,
            status: PurchaseOrderStatus::Draft,
            pricing_mode,
            subtotal_cents: 0,
            tax_cents: 0,
            total_cents: 0,
            notes: request.notes.clone(),
            created_by: request.actor_id.clone(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO purchase_orders (
                id, order_number, supplier_id, order_date, status, pricing_mode,
                subtotal_cents, tax_cents, total_cents, notes, created_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0, 0, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&order.id)
        .bind(&order.order_number)
        .bind(&order.supplier_id)
        .bind(order.order_date)
        .bind(order.status)
        .bind(order.pricing_mode)
        .bind(&order.notes)
        .bind(&order.created_by)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        write_items(&mut tx, &order.id, pricing_mode, &request.lines).await?;
        let detail = load_detail(&mut tx, &order.id).await?;

        tx.commit().await?;

        info!(
            id = %detail.order.id,
            number = %detail.order.order_number,
            items = detail.items.len(),
            total_cents = detail.order.total_cents,
            "Purchase order created"
        );
        Ok(detail)
    }

    /// Gets an order with its items.
    pub async fn get(&self, id: &str) -> DbResult<Option<PurchaseOrderDetail>> {
        let mut conn = self.pool.acquire().await?;
        match load_detail(&mut conn, id).await {
            Ok(detail) => Ok(Some(detail)),
            Err(DbError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Headers, newest first, optionally filtered by status.
    pub async fn list(&self, status: Option<PurchaseOrderStatus>) -> DbResult<Vec<PurchaseOrder>> {
        let orders = sqlx::query_as::<_, PurchaseOrder>(
            r#"
            SELECT * FROM purchase_orders
            WHERE (?1 IS NULL OR status = ?1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    /// Replaces every item of a draft order.
    pub async fn replace_items(
        &self,
        id: &str,
        lines: &[OrderLineInput],
        actor_id: &str,
    ) -> DbResult<PurchaseOrderDetail> {
        validate_actor(actor_id)?;
        validate_order_lines(lines)?;

        let mut tx = self.pool.begin().await?;
        let order = fetch_order(&mut tx, id).await?;
        ensure_editable(&order)?;

        sqlx::query("DELETE FROM purchase_order_items WHERE purchase_order_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        write_items(&mut tx, id, order.pricing_mode, lines).await?;
        let detail = load_detail(&mut tx, id).await?;

        tx.commit().await?;

        info!(id = %id, items = detail.items.len(), actor_id = %actor_id, "Purchase order items replaced");
        Ok(detail)
    }

    /// Draft → sent. An order without items cannot be sent.
    pub async fn send(&self, id: &str, actor_id: &str) -> DbResult<PurchaseOrder> {
        validate_actor(actor_id)?;

        let mut tx = self.pool.begin().await?;
        let order = fetch_order(&mut tx, id).await?;
        let items = fetch_items(&mut tx, id).await?;
        ensure_sendable(&order, &items)?;

        set_status(&mut tx, &order, PurchaseOrderStatus::Sent).await?;
        let order = fetch_order(&mut tx, id).await?;
        tx.commit().await?;

        info!(id = %id, actor_id = %actor_id, "Purchase order sent");
        Ok(order)
    }

    /// Draft or sent → cancelled. Stock already received stays in the ledger.
    pub async fn cancel(&self, id: &str, actor_id: &str) -> DbResult<PurchaseOrder> {
        validate_actor(actor_id)?;

        let mut tx = self.pool.begin().await?;
        let order = fetch_order(&mut tx, id).await?;
        ensure_transition(&order, PurchaseOrderStatus::Cancelled)?;

        set_status(&mut tx, &order, PurchaseOrderStatus::Cancelled).await?;
        let order = fetch_order(&mut tx, id).await?;
        tx.commit().await?;

        info!(id = %id, actor_id = %actor_id, "Purchase order cancelled");
        Ok(order)
    }

    // =========================================================================
    // Receiving
    // =========================================================================

    /// Receives goods against a sent order into one store, atomically.
    ///
    /// ## Errors
    /// - `InvalidStateTransition` unless the order is `sent`
    /// - `UnknownReference` for a store that does not exist
    /// - `InvalidReceivingQuantity` for a quantity that is not positive or
    ///   exceeds what remains outstanding, including when a concurrent
    ///   receipt took the remainder first
    pub async fn receive_items(&self, request: &ReceiveItemsRequest) -> DbResult<ReceiveOutcome> {
        retry_on_conflict("receive_items", || self.receive_once(request)).await
    }

    async fn receive_once(&self, request: &ReceiveItemsRequest) -> DbResult<ReceiveOutcome> {
        let mut tx = self.pool.begin().await?;

        let order = fetch_order(&mut tx, &request.purchase_order_id).await?;
        ensure_exists(&mut *tx, "stores", "store_id", &request.store_id).await?;
        let items = fetch_items(&mut tx, &order.id).await?;
        let plan = plan_receipt(&order, &items, request)?;

        let now = Utc::now();
        let mut receipts = Vec::with_capacity(plan.len());

        for line in &plan {
            let result = sqlx::query(
                r#"
                UPDATE purchase_order_items
                SET received_quantity = received_quantity + ?2
                WHERE id = ?1 AND received_quantity + ?2 <= quantity
                "#,
            )
            .bind(&line.item_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                let remaining: i64 = sqlx::query_scalar(
                    "SELECT quantity - received_quantity FROM purchase_order_items WHERE id = ?1",
                )
                .bind(&line.item_id)
                .fetch_one(&mut *tx)
                .await?;

                return Err(CoreError::InvalidReceivingQuantity {
                    purchase_order_id: order.id.clone(),
                    product_id: line.product_id.clone(),
                    requested: line.quantity,
                    remaining,
                }
                .into());
            }

            let receipt = InventoryReceipt {
                id: generate_id(),
                purchase_order_id: order.id.clone(),
                purchase_order_item_id: line.item_id.clone(),
                product_id: line.product_id.clone(),
                store_id: request.store_id.clone(),
                received_quantity: line.quantity,
                unit_cost_cents: line.unit_cost_cents,
                notes: request.notes.clone(),
                received_by: request.actor_id.clone(),
                received_at: now,
            };

            sqlx::query(
                r#"
                INSERT INTO inventory_receipts (
                    id, purchase_order_id, purchase_order_item_id, product_id, store_id,
                    received_quantity, unit_cost_cents, notes, received_by, received_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )
            .bind(&receipt.id)
            .bind(&receipt.purchase_order_id)
            .bind(&receipt.purchase_order_item_id)
            .bind(&receipt.product_id)
            .bind(&receipt.store_id)
            .bind(receipt.received_quantity)
            .bind(receipt.unit_cost_cents)
            .bind(&receipt.notes)
            .bind(&receipt.received_by)
            .bind(receipt.received_at)
            .execute(&mut *tx)
            .await?;

            let movement = Movement::new(
                StockKey::new(&request.store_id, &line.product_id),
                line.quantity,
                MovementReason::Receipt,
                &request.actor_id,
            )
            .reference(&receipt.id)
            .note(request.notes.clone());
            apply_movement(&mut tx, &movement, now).await?;

            receipts.push(receipt);
        }

        let items = fetch_items(&mut tx, &order.id).await?;
        let po_status = status_after_receipt(&items);
        if po_status != order.status {
            set_status(&mut tx, &order, po_status).await?;
        }

        tx.commit().await?;

        info!(
            purchase_order_id = %order.id,
            store_id = %request.store_id,
            lines = receipts.len(),
            status = ?po_status,
            actor_id = %request.actor_id,
            "Items received"
        );

        Ok(ReceiveOutcome {
            purchase_order_id: order.id,
            po_status,
            receipts,
        })
    }

    /// Receipt audit trail of one order, oldest first.
    pub async fn receipts(&self, purchase_order_id: &str) -> DbResult<Vec<InventoryReceipt>> {
        let receipts = sqlx::query_as::<_, InventoryReceipt>(
            "SELECT * FROM inventory_receipts WHERE purchase_order_id = ?1 ORDER BY rowid",
        )
        .bind(purchase_order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(receipts)
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn fetch_order(conn: &mut SqliteConnection, id: &str) -> DbResult<PurchaseOrder> {
    sqlx::query_as::<_, PurchaseOrder>("SELECT * FROM purchase_orders WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("PurchaseOrder", id))
}

async fn fetch_items(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<PurchaseOrderItem>> {
    let items = sqlx::query_as::<_, PurchaseOrderItem>(
        "SELECT * FROM purchase_order_items WHERE purchase_order_id = ?1 ORDER BY rowid",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(items)
}

async fn load_detail(conn: &mut SqliteConnection, id: &str) -> DbResult<PurchaseOrderDetail> {
    let order = fetch_order(conn, id).await?;
    let items = fetch_items(conn, id).await?;
    Ok(PurchaseOrderDetail { order, items })
}

/// Conditional on the status the caller read, so two racing transitions
/// cannot both win.
async fn set_status(
    conn: &mut SqliteConnection,
    order: &PurchaseOrder,
    next: PurchaseOrderStatus,
) -> DbResult<()> {
    let result = sqlx::query(
        "UPDATE purchase_orders SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
    )
    .bind(&order.id)
    .bind(order.status)
    .bind(next)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::ConcurrencyConflict(format!(
            "purchase order {} changed status concurrently",
            order.id
        )));
    }
    debug!(id = %order.id, from = ?order.status, to = ?next, "Purchase order status set");
    Ok(())
}

/// Prices and inserts items, then rewrites the header totals.
async fn write_items(
    conn: &mut SqliteConnection,
    order_id: &str,
    mode: PricingMode,
    lines: &[OrderLineInput],
) -> DbResult<()> {
    let mut priced = Vec::with_capacity(lines.len());

    for line in lines {
        ensure_exists(&mut *conn, "products", "product_id", &line.product_id).await?;
        let pricing = price_line(line.quantity, line.unit_price_cents, line.tax_type, mode)?;

        sqlx::query(
            r#"
            INSERT INTO purchase_order_items (
                id, purchase_order_id, product_id, quantity, unit_price_cents, tax_type,
                net_price_cents, tax_amount_cents, total_price_cents, received_quantity
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0)
            "#,
        )
        .bind(generate_id())
        .bind(order_id)
        .bind(&line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .bind(line.tax_type)
        .bind(pricing.net_price_cents)
        .bind(pricing.tax_amount_cents)
        .bind(pricing.total_price_cents)
        .execute(&mut *conn)
        .await?;

        priced.push(pricing);
    }

    let totals = document_totals(&priced)?;
    sqlx::query(
        r#"
        UPDATE purchase_orders
        SET subtotal_cents = ?2, tax_cents = ?3, total_cents = ?4, updated_at = ?5
        WHERE id = ?1
        "#,
    )
    .bind(order_id)
    .bind(totals.subtotal_cents)
    .bind(totals.tax_cents)
    .bind(totals.total_cents)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::test_support::{line, populate, today, world, World, ACTOR};
    use stockline_core::purchase::ReceiveLine;
    use stockline_core::ValidationError;
    use uuid::Uuid;

    async fn sent_order(w: &World, lines: Vec<OrderLineInput>) -> PurchaseOrderDetail {
        let purchases = w.db.purchases();
        let detail = purchases
            .create(&NewPurchaseOrder {
                supplier_id: w.supplier.id.clone(),
                order_date: today(),
                pricing_mode: None,
                lines,
                notes: None,
                actor_id: ACTOR.to_string(),
            })
            .await
            .unwrap();
        purchases.send(&detail.order.id, ACTOR).await.unwrap();
        purchases.get(&detail.order.id).await.unwrap().unwrap()
    }

    fn receive(w: &World, order_id: &str, product_id: &str, quantity: i64) -> ReceiveItemsRequest {
        ReceiveItemsRequest {
            purchase_order_id: order_id.to_string(),
            store_id: w.store.id.clone(),
            items: vec![ReceiveLine {
                product_id: product_id.to_string(),
                received_quantity: quantity,
                unit_cost_cents: None,
            }],
            notes: None,
            actor_id: ACTOR.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_prices_items_and_totals() {
        let w = world().await;
        let detail = w
            .db
            .purchases()
            .create(&NewPurchaseOrder {
                supplier_id: w.supplier.id.clone(),
                order_date: today(),
                pricing_mode: Some(PricingMode::Exclusive),
                lines: vec![line(&w.product, 2, 5_000), line(&w.other_product, 1, 1_000)],
                notes: Some("first order".to_string()),
                actor_id: ACTOR.to_string(),
            })
            .await
            .unwrap();

        assert_eq!(detail.order.status, PurchaseOrderStatus::Draft);
        assert!(detail.order.order_number.starts_with("PO-"));
        assert_eq!(detail.items.len(), 2);
        assert_eq!(detail.order.subtotal_cents, 11_000);
        assert_eq!(detail.order.tax_cents, 1_760);
        assert_eq!(detail.order.total_cents, 12_760);
    }

    #[tokio::test]
    async fn test_unknown_supplier_rejected() {
        let w = world().await;
        let err = w
            .db
            .purchases()
            .create(&NewPurchaseOrder {
                supplier_id: "missing".to_string(),
                order_date: today(),
                pricing_mode: None,
                lines: vec![line(&w.product, 1, 100)],
                notes: None,
                actor_id: ACTOR.to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::UnknownReference { .. }))
        ));
    }

    #[tokio::test]
    async fn test_oversized_unit_price_rejected() {
        let w = world().await;
        let err = w
            .db
            .purchases()
            .create(&NewPurchaseOrder {
                supplier_id: w.supplier.id.clone(),
                order_date: today(),
                pricing_mode: None,
                lines: vec![line(&w.product, 1_000, i64::MAX / 10)],
                notes: None,
                actor_id: ACTOR.to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
        assert!(w.db.purchases().list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_items_editable_only_in_draft() {
        let w = world().await;
        let purchases = w.db.purchases();
        let detail = purchases
            .create(&NewPurchaseOrder {
                supplier_id: w.supplier.id.clone(),
                order_date: today(),
                pricing_mode: None,
                lines: vec![line(&w.product, 1, 100)],
                notes: None,
                actor_id: ACTOR.to_string(),
            })
            .await
            .unwrap();
        let id = detail.order.id.clone();

        let edited = purchases
            .replace_items(&id, &[line(&w.other_product, 4, 250)], ACTOR)
            .await
            .unwrap();
        assert_eq!(edited.items.len(), 1);
        assert_eq!(edited.items[0].product_id, w.other_product.id);

        purchases.send(&id, ACTOR).await.unwrap();
        let err = purchases
            .replace_items(&id, &[line(&w.product, 1, 100)], ACTOR)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidStateTransition { .. })));
    }

    #[tokio::test]
    async fn test_receive_in_two_parts_completes_order() {
        let w = world().await;
        let order = sent_order(&w, vec![line(&w.product, 100, 1_000)]).await;
        let id = &order.order.id;
        let purchases = w.db.purchases();

        let first = purchases.receive_items(&receive(&w, id, &w.product.id, 60)).await.unwrap();
        assert_eq!(first.po_status, PurchaseOrderStatus::Sent);
        assert_eq!(w.on_hand(&w.store, &w.product).await, 60);

        let second = purchases.receive_items(&receive(&w, id, &w.product.id, 40)).await.unwrap();
        assert_eq!(second.po_status, PurchaseOrderStatus::Received);
        assert_eq!(w.on_hand(&w.store, &w.product).await, 100);

        let detail = purchases.get(id).await.unwrap().unwrap();
        assert_eq!(detail.items[0].received_quantity, 100);
        assert_eq!(purchases.receipts(id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_receive_boundary() {
        let w = world().await;
        let order = sent_order(&w, vec![line(&w.product, 100, 1_000)]).await;
        let id = &order.order.id;
        let purchases = w.db.purchases();
        purchases.receive_items(&receive(&w, id, &w.product.id, 60)).await.unwrap();

        let err = purchases
            .receive_items(&receive(&w, id, &w.product.id, 41))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidReceivingQuantity { requested: 41, remaining: 40, .. })
        ));
        assert_eq!(w.on_hand(&w.store, &w.product).await, 60);

        let done = purchases.receive_items(&receive(&w, id, &w.product.id, 40)).await.unwrap();
        assert_eq!(done.po_status, PurchaseOrderStatus::Received);
    }

    #[tokio::test]
    async fn test_receive_is_all_or_nothing() {
        let w = world().await;
        let order = sent_order(
            &w,
            vec![line(&w.product, 10, 1_000), line(&w.other_product, 5, 1_000)],
        )
        .await;

        let mut request = receive(&w, &order.order.id, &w.product.id, 10);
        request.items.push(ReceiveLine {
            product_id: w.other_product.id.clone(),
            received_quantity: 6,
            unit_cost_cents: None,
        });

        assert!(w.db.purchases().receive_items(&request).await.is_err());
        assert_eq!(w.on_hand(&w.store, &w.product).await, 0);
        assert!(w.db.purchases().receipts(&order.order.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_receive_requires_sent_order_and_known_store() {
        let w = world().await;
        let purchases = w.db.purchases();
        let draft = purchases
            .create(&NewPurchaseOrder {
                supplier_id: w.supplier.id.clone(),
                order_date: today(),
                pricing_mode: None,
                lines: vec![line(&w.product, 5, 100)],
                notes: None,
                actor_id: ACTOR.to_string(),
            })
            .await
            .unwrap();

        let err = purchases
            .receive_items(&receive(&w, &draft.order.id, &w.product.id, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidStateTransition { .. })));

        purchases.send(&draft.order.id, ACTOR).await.unwrap();
        let mut request = receive(&w, &draft.order.id, &w.product.id, 1);
        request.store_id = "missing".to_string();
        let err = purchases.receive_items(&request).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::UnknownReference { .. }))
        ));

        let err = purchases
            .receive_items(&receive(&w, "missing", &w.product.id, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_cancel_from_draft_and_sent_only() {
        let w = world().await;
        let order = sent_order(&w, vec![line(&w.product, 10, 100)]).await;
        let purchases = w.db.purchases();

        let cancelled = purchases.cancel(&order.order.id, ACTOR).await.unwrap();
        assert_eq!(cancelled.status, PurchaseOrderStatus::Cancelled);

        let err = purchases.cancel(&order.order.id, ACTOR).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidStateTransition { .. })));

        let listed = purchases.list(Some(PurchaseOrderStatus::Cancelled)).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_receipts_never_over_receive() {
        let path = std::env::temp_dir().join(format!("stockline-{}.db", Uuid::new_v4()));
        let db = Database::new(DbConfig::new(&path).max_connections(4)).await.unwrap();
        let w = populate(db).await;

        let order = sent_order(&w, vec![line(&w.product, 100, 1_000)]).await;
        let id = order.order.id.clone();
        let purchases = w.db.purchases();

        let first = receive(&w, &id, &w.product.id, 60);
        let second = receive(&w, &id, &w.product.id, 60);
        let (a, b) = tokio::join!(purchases.receive_items(&first), purchases.receive_items(&second));

        assert_eq!(
            [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(),
            1,
            "exactly one receipt of 60 fits in 100"
        );
        let loser = if a.is_err() { a } else { b };
        assert!(matches!(
            loser,
            Err(DbError::Domain(CoreError::InvalidReceivingQuantity { .. }))
        ));

        let detail = purchases.get(&id).await.unwrap().unwrap();
        assert_eq!(detail.items[0].received_quantity, 60);
        assert_eq!(w.on_hand(&w.store, &w.product).await, 60);

        w.db.close().await;
        let _ = std::fs::remove_file(&path);
    }
}
