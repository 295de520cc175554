//! # Delivery Note Repository
//!
//! Delivery notes plan part of a sales order's quantity; marking one
//! delivered is what actually takes stock out of the order's store.
//!
//! ## Mark Delivered
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │   ├── note open? order live?                                            │
//! │   ├── per item:                                                         │
//! │   │     UPDATE sales_order_items  shipped += q   WHERE shipped+q <= qty │
//! │   │     UPDATE delivery_note_items delivered = q WHERE delivered = 0    │
//! │   │     apply_movement(store, product, -q, shipment)                    │
//! │   ├── note → Delivered                                                  │
//! │   └── order → In Transit / Complete (progress_after_delivery)           │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::inventory::apply_movement;
use crate::repository::sales::{self as orders, ensure_active_rider, fetch_items, fetch_order};
use crate::repository::{document_number, generate_id};
use crate::retry::retry_on_conflict;
use stockline_core::delivery::{
    self, DeliveryNote, DeliveryNoteDetail, DeliveryNoteItem, DeliveryNoteStatus,
    DeliveryProgress, NewDeliveryNote,
};
use stockline_core::ledger::{Movement, MovementReason};
use stockline_core::sales::{progress_after_delivery, FulfillmentStatus};
use stockline_core::validation::validate_actor;
use stockline_core::{CoreError, StockKey};

/// Repository for delivery notes.
#[derive(Debug, Clone)]
pub struct DeliveryNoteRepository {
    pool: SqlitePool,
}

impl DeliveryNoteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DeliveryNoteRepository { pool }
    }

    /// Plans a shipment against an Approved, In Transit or Complete order.
    ///
    /// ## Errors
    /// `QuantityExceeded` when a line asks for more than
    /// `quantity - shipped - planned on other open notes`.
    pub async fn create(&self, request: &NewDeliveryNote) -> DbResult<DeliveryNoteDetail> {
        let mut tx = self.pool.begin().await?;

        let order = fetch_order(&mut tx, &request.sales_order_id).await?;
        let items = fetch_items(&mut tx, &order.id).await?;
        let planned = planned_on_open_notes(&mut tx, &order.id).await?;
        let plan = delivery::plan_delivery_note(&order, &items, &planned, request)?;

        let now = Utc::now();
        let note_id = generate_id();

        sqlx::query(
            r#"
            INSERT INTO delivery_notes (
                id, note_number, sales_order_id, customer_id, delivery_date, status,
                my_status, rider_id, notes, created_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8, ?9, ?10, ?10)
            "#,
        )
        .bind(&note_id)
        .bind(document_number("DN", request.delivery_date))
        .bind(&order.id)
        .bind(&order.customer_id)
        .bind(request.delivery_date)
        .bind(DeliveryNoteStatus::Open)
        .bind(DeliveryProgress::Draft)
        .bind(&request.notes)
        .bind(&request.actor_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for line in &plan {
            sqlx::query(
                r#"
                INSERT INTO delivery_note_items (
                    id, delivery_note_id, sales_order_item_id, product_id, quantity, delivered_quantity
                ) VALUES (?1, ?2, ?3, ?4, ?5, 0)
                "#,
            )
            .bind(generate_id())
            .bind(&note_id)
            .bind(&line.sales_order_item_id)
            .bind(&line.product_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
        }

        let detail = load_detail(&mut tx, &note_id).await?;
        tx.commit().await?;

        info!(
            id = %detail.note.id,
            number = %detail.note.note_number,
            sales_order_id = %order.id,
            lines = detail.items.len(),
            "Delivery note created"
        );
        Ok(detail)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<DeliveryNoteDetail>> {
        let mut conn = self.pool.acquire().await?;
        match load_detail(&mut conn, id).await {
            Ok(detail) => Ok(Some(detail)),
            Err(DbError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn list_for_order(&self, sales_order_id: &str) -> DbResult<Vec<DeliveryNote>> {
        let notes = sqlx::query_as::<_, DeliveryNote>(
            "SELECT * FROM delivery_notes WHERE sales_order_id = ?1 ORDER BY rowid",
        )
        .bind(sales_order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(notes)
    }

    // =========================================================================
    // Progress
    // =========================================================================

    /// Draft → Prepared.
    pub async fn prepare(&self, id: &str, actor_id: &str) -> DbResult<DeliveryNote> {
        validate_actor(actor_id)?;

        let mut tx = self.pool.begin().await?;
        let note = fetch_note(&mut tx, id).await?;
        let next = delivery::prepare(&note)?;
        set_note_progress(&mut tx, &note, next).await?;
        let note = fetch_note(&mut tx, id).await?;
        tx.commit().await?;

        info!(id = %id, actor_id = %actor_id, "Delivery note prepared");
        Ok(note)
    }

    /// Assigns a rider while the note is Prepared.
    pub async fn assign_rider(&self, id: &str, rider_id: &str, actor_id: &str) -> DbResult<DeliveryNote> {
        validate_actor(actor_id)?;

        let mut tx = self.pool.begin().await?;
        let note = fetch_note(&mut tx, id).await?;
        delivery::ensure_rider_assignable(&note)?;
        ensure_active_rider(&mut tx, rider_id).await?;

        let result = sqlx::query(
            "UPDATE delivery_notes SET rider_id = ?2, updated_at = ?4 WHERE id = ?1 AND my_status = ?3",
        )
        .bind(id)
        .bind(rider_id)
        .bind(DeliveryProgress::Prepared)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::ConcurrencyConflict(format!(
                "delivery note {} left Prepared during rider assignment",
                id
            )));
        }

        let note = fetch_note(&mut tx, id).await?;
        tx.commit().await?;

        info!(id = %id, rider_id = %rider_id, actor_id = %actor_id, "Rider assigned to delivery note");
        Ok(note)
    }

    /// Prepared → In Transit. An Approved order follows to In Transit.
    pub async fn dispatch(&self, id: &str, actor_id: &str) -> DbResult<DeliveryNote> {
        validate_actor(actor_id)?;

        let mut tx = self.pool.begin().await?;
        let note = fetch_note(&mut tx, id).await?;
        let next = delivery::dispatch(&note)?;
        set_note_progress(&mut tx, &note, next).await?;

        let order = fetch_order(&mut tx, &note.sales_order_id).await?;
        if order.my_status == FulfillmentStatus::Approved {
            orders::set_progress(&mut tx, &order, FulfillmentStatus::InTransit, order.status).await?;
        }

        let note = fetch_note(&mut tx, id).await?;
        tx.commit().await?;

        info!(id = %id, actor_id = %actor_id, "Delivery note dispatched");
        Ok(note)
    }

    /// Cancels an open note, releasing its planned quantity.
    pub async fn cancel(&self, id: &str, actor_id: &str) -> DbResult<DeliveryNote> {
        validate_actor(actor_id)?;

        let mut tx = self.pool.begin().await?;
        let note = fetch_note(&mut tx, id).await?;
        let next = delivery::cancel(&note)?;
        set_note_progress(&mut tx, &note, next).await?;
        let note = fetch_note(&mut tx, id).await?;
        tx.commit().await?;

        info!(id = %id, actor_id = %actor_id, "Delivery note cancelled");
        Ok(note)
    }

    // =========================================================================
    // Shipment
    // =========================================================================

    /// Ships every line of an open note out of the order's store.
    ///
    /// ## Errors
    /// - `QuantityExceeded` if the order item has no room left
    /// - `NegativeInventory` if the store does not hold enough stock
    ///
    /// Either way nothing is written.
    pub async fn mark_delivered(&self, id: &str, actor_id: &str) -> DbResult<DeliveryNoteDetail> {
        validate_actor(actor_id)?;
        retry_on_conflict("mark_delivered", || self.deliver_once(id, actor_id)).await
    }

    async fn deliver_once(&self, id: &str, actor_id: &str) -> DbResult<DeliveryNoteDetail> {
        let mut tx = self.pool.begin().await?;

        let note = fetch_note(&mut tx, id).await?;
        let order = fetch_order(&mut tx, &note.sales_order_id).await?;
        delivery::ensure_deliverable(&note, &order)?;
        let lines = fetch_note_items(&mut tx, id).await?;

        let now = Utc::now();
        for line in &lines {
            let shipped = sqlx::query(
                r#"
                UPDATE sales_order_items
                SET shipped_quantity = shipped_quantity + ?2
                WHERE id = ?1 AND shipped_quantity + ?2 <= quantity
                "#,
            )
            .bind(&line.sales_order_item_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;

            if shipped.rows_affected() == 0 {
                let remaining: i64 = sqlx::query_scalar(
                    "SELECT quantity - shipped_quantity FROM sales_order_items WHERE id = ?1",
                )
                .bind(&line.sales_order_item_id)
                .fetch_one(&mut *tx)
                .await?;

                return Err(CoreError::QuantityExceeded {
                    entity: "SalesOrderItem".to_string(),
                    item_id: line.sales_order_item_id.clone(),
                    requested: line.quantity,
                    remaining,
                }
                .into());
            }

            let delivered = sqlx::query(
                r#"
                UPDATE delivery_note_items SET delivered_quantity = quantity
                WHERE id = ?1 AND delivered_quantity = 0
                "#,
            )
            .bind(&line.id)
            .execute(&mut *tx)
            .await?;
            if delivered.rows_affected() == 0 {
                return Err(DbError::ConcurrencyConflict(format!(
                    "delivery note item {} delivered concurrently",
                    line.id
                )));
            }

            let movement = Movement::new(
                StockKey::new(&order.store_id, &line.product_id),
                -line.quantity,
                MovementReason::Shipment,
                actor_id,
            )
            .reference(&note.id);
            apply_movement(&mut tx, &movement, now).await?;
        }

        set_note_progress(&mut tx, &note, DeliveryProgress::Delivered).await?;

        let items = fetch_items(&mut tx, &order.id).await?;
        let (my_status, status) = progress_after_delivery(&order, &items);
        if (my_status, status) != (order.my_status, order.status) {
            orders::set_progress(&mut tx, &order, my_status, status).await?;
        }

        let detail = load_detail(&mut tx, id).await?;
        tx.commit().await?;

        info!(
            id = %id,
            sales_order_id = %order.id,
            store_id = %order.store_id,
            units = lines.iter().map(|l| l.quantity).sum::<i64>(),
            order_status = ?my_status,
            actor_id = %actor_id,
            "Delivery note delivered"
        );
        Ok(detail)
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn fetch_note(conn: &mut SqliteConnection, id: &str) -> DbResult<DeliveryNote> {
    sqlx::query_as::<_, DeliveryNote>("SELECT * FROM delivery_notes WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("DeliveryNote", id))
}

async fn fetch_note_items(conn: &mut SqliteConnection, note_id: &str) -> DbResult<Vec<DeliveryNoteItem>> {
    let items = sqlx::query_as::<_, DeliveryNoteItem>(
        "SELECT * FROM delivery_note_items WHERE delivery_note_id = ?1 ORDER BY rowid",
    )
    .bind(note_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(items)
}

async fn load_detail(conn: &mut SqliteConnection, id: &str) -> DbResult<DeliveryNoteDetail> {
    let note = fetch_note(conn, id).await?;
    let items = fetch_note_items(conn, id).await?;
    Ok(DeliveryNoteDetail { note, items })
}

/// Sales order item id → quantity planned on notes that are still open.
async fn planned_on_open_notes(
    conn: &mut SqliteConnection,
    order_id: &str,
) -> DbResult<HashMap<String, i64>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT i.sales_order_item_id, SUM(i.quantity)
        FROM delivery_note_items i
        JOIN delivery_notes n ON n.id = i.delivery_note_id
        WHERE n.sales_order_id = ?1 AND n.my_status IN (?2, ?3, ?4)
        GROUP BY i.sales_order_item_id
        "#,
    )
    .bind(order_id)
    .bind(DeliveryProgress::Draft)
    .bind(DeliveryProgress::Prepared)
    .bind(DeliveryProgress::InTransit)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().collect())
}

/// Moves a note to `next`, keeping the coarse status in step.
async fn set_note_progress(
    conn: &mut SqliteConnection,
    note: &DeliveryNote,
    next: DeliveryProgress,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE delivery_notes SET my_status = ?3, status = ?4, updated_at = ?5
        WHERE id = ?1 AND my_status = ?2
        "#,
    )
    .bind(&note.id)
    .bind(note.my_status)
    .bind(next)
    .bind(next.coarse())
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::ConcurrencyConflict(format!(
            "delivery note {} changed status concurrently",
            note.id
        )));
    }
    debug!(id = %note.id, from = ?note.my_status, to = ?next, "Delivery note progress set");
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::test_support::{populate, today, world, World, ACTOR};
    use delivery::DeliveryLineInput;
    use uuid::Uuid;
    use stockline_core::sales::{SalesOrderDetail, SalesOrderStatus};

    fn note_request(order: &SalesOrderDetail, quantity: i64) -> NewDeliveryNote {
        NewDeliveryNote {
            sales_order_id: order.order.id.clone(),
            delivery_date: today(),
            lines: vec![DeliveryLineInput {
                sales_order_item_id: order.items[0].id.clone(),
                quantity,
            }],
            notes: None,
            actor_id: ACTOR.to_string(),
        }
    }

    async fn deliver(w: &World, order: &SalesOrderDetail, quantity: i64) -> DbResult<DeliveryNoteDetail> {
        let note = w.db.deliveries().create(&note_request(order, quantity)).await?;
        w.db.deliveries().mark_delivered(&note.note.id, ACTOR).await
    }

    #[tokio::test]
    async fn test_partial_then_full_shipment() {
        let w = world().await;
        w.stock(&w.store, &w.product, 50).await;
        let order = w.approved_order(20).await;

        deliver(&w, &order, 12).await.unwrap();
        let after_first = w.db.sales().get(&order.order.id).await.unwrap().unwrap();
        assert_eq!(after_first.items[0].shipped_quantity, 12);
        assert_eq!(after_first.order.my_status, FulfillmentStatus::InTransit);
        assert_eq!(after_first.order.status, SalesOrderStatus::Shipped);
        assert_eq!(w.on_hand(&w.store, &w.product).await, 38);

        let second = deliver(&w, &order, 8).await.unwrap();
        assert_eq!(second.note.my_status, DeliveryProgress::Delivered);
        assert_eq!(second.note.status, DeliveryNoteStatus::Delivered);
        assert_eq!(second.items[0].delivered_quantity, 8);

        let complete = w.db.sales().get(&order.order.id).await.unwrap().unwrap();
        assert_eq!(complete.items[0].shipped_quantity, 20);
        assert_eq!(complete.order.my_status, FulfillmentStatus::Complete);
        assert_eq!(complete.order.status, SalesOrderStatus::Delivered);
        assert_eq!(w.on_hand(&w.store, &w.product).await, 30);

        let err = w.db.deliveries().create(&note_request(&order, 1)).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::QuantityExceeded { requested: 1, remaining: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_open_notes_reserve_planned_quantity() {
        let w = world().await;
        let order = w.approved_order(10).await;
        let deliveries = w.db.deliveries();

        let first = deliveries.create(&note_request(&order, 7)).await.unwrap();
        let err = deliveries.create(&note_request(&order, 4)).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::QuantityExceeded { remaining: 3, .. })
        ));

        deliveries.cancel(&first.note.id, ACTOR).await.unwrap();
        deliveries.create(&note_request(&order, 10)).await.unwrap();
    }

    #[tokio::test]
    async fn test_delivery_never_drives_stock_negative() {
        let w = world().await;
        w.stock(&w.store, &w.product, 3).await;
        let order = w.approved_order(5).await;

        let err = deliver(&w, &order, 5).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::NegativeInventory { on_hand: 3, delta: -5, .. })
        ));

        let unchanged = w.db.sales().get(&order.order.id).await.unwrap().unwrap();
        assert_eq!(unchanged.items[0].shipped_quantity, 0);
        assert_eq!(w.on_hand(&w.store, &w.product).await, 3);
    }

    #[tokio::test]
    async fn test_note_progress_and_rider() {
        let w = world().await;
        let order = w.approved_order(5).await;
        let deliveries = w.db.deliveries();
        let note = deliveries.create(&note_request(&order, 5)).await.unwrap();
        let id = &note.note.id;

        let err = deliveries.assign_rider(id, &w.rider.id, ACTOR).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidStateTransition { .. })));

        deliveries.prepare(id, ACTOR).await.unwrap();
        assert!(deliveries.dispatch(id, ACTOR).await.is_err());

        deliveries.assign_rider(id, &w.rider.id, ACTOR).await.unwrap();
        let dispatched = deliveries.dispatch(id, ACTOR).await.unwrap();
        assert_eq!(dispatched.my_status, DeliveryProgress::InTransit);
        assert_eq!(dispatched.status, DeliveryNoteStatus::Open);

        let order = w.db.sales().get(&order.order.id).await.unwrap().unwrap();
        assert_eq!(order.order.my_status, FulfillmentStatus::InTransit);
    }

    #[tokio::test]
    async fn test_cancel_then_reverse_restores_exactly_what_shipped() {
        let w = world().await;
        w.stock(&w.store, &w.product, 40).await;
        let order = w.approved_order(20).await;
        deliver(&w, &order, 12).await.unwrap();
        let open = w.db.deliveries().create(&note_request(&order, 8)).await.unwrap();
        assert_eq!(w.on_hand(&w.store, &w.product).await, 28);

        let sales = w.db.sales();
        sales.cancel(&order.order.id, ACTOR).await.unwrap();

        let cancelled_note = w.db.deliveries().get(&open.note.id).await.unwrap().unwrap();
        assert_eq!(cancelled_note.note.my_status, DeliveryProgress::Cancelled);

        let outcome = sales.receive_back_to_stock(&order.order.id, ACTOR).await.unwrap();
        assert_eq!(outcome.restored.len(), 1);
        assert_eq!(outcome.restored[0].quantity, 12);
        assert_eq!(w.on_hand(&w.store, &w.product).await, 40);

        let again = sales.receive_back_to_stock(&order.order.id, ACTOR).await.unwrap();
        assert!(again.restored.is_empty());
        assert_eq!(w.on_hand(&w.store, &w.product).await, 40);

        let reloaded = sales.get(&order.order.id).await.unwrap().unwrap();
        assert_eq!(reloaded.items[0].shipped_quantity, 0);
        assert!(reloaded.order.stock_reversed);
    }

    #[tokio::test]
    async fn test_concurrent_deliveries_ship_once() {
        let path = std::env::temp_dir().join(format!("stockline-{}.db", Uuid::new_v4()));
        let db = Database::new(DbConfig::new(&path).max_connections(4)).await.unwrap();
        let w = populate(db).await;

        w.stock(&w.store, &w.product, 50).await;
        let order = w.approved_order(10).await;
        let note = w.db.deliveries().create(&note_request(&order, 10)).await.unwrap();
        let id = note.note.id.clone();

        let (first, second) = (w.db.deliveries(), w.db.deliveries());
        let (a, b) = tokio::join!(first.mark_delivered(&id, ACTOR), second.mark_delivered(&id, ACTOR));

        assert_eq!(
            [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(),
            1,
            "a note is delivered once"
        );
        let loser = if a.is_err() { a } else { b };
        assert!(matches!(
            loser,
            Err(DbError::Domain(CoreError::InvalidStateTransition { .. }))
                | Err(DbError::Domain(CoreError::QuantityExceeded { .. }))
                | Err(DbError::ConcurrencyConflict(_))
        ));

        assert_eq!(w.on_hand(&w.store, &w.product).await, 40);
        let detail = w.db.sales().get(&order.order.id).await.unwrap().unwrap();
        assert_eq!(detail.items[0].shipped_quantity, 10);
        let delivered = w.db.deliveries().get(&id).await.unwrap().unwrap();
        assert_eq!(delivered.items[0].delivered_quantity, 10);

        let shipments = w
            .db
            .inventory()
            .transactions(Some(&w.store.id), Some(&w.product.id), 10)
            .await
            .unwrap()
            .into_iter()
            .filter(|t| t.reason == MovementReason::Shipment)
            .count();
        assert_eq!(shipments, 1);

        w.db.close().await;
        let _ = std::fs::remove_file(&path);
    }
}
