//! # Sales Order Repository
//!
//! Sales order lifecycle: creation, approval, rider assignment, dispatch,
//! cancellation, short-closing and returning shipped stock.
//!
//! ## Two Status Columns
//! ```text
//! my_status   0 New ──► 1 Approved ──► 2 In Transit ──► 3 Complete
//!               │            │               │
//!               ▼            └──────┬────────┘
//!            5 Declined             ▼
//!                              4 Cancelled ──► receive_back_to_stock
//!
//! status      draft → confirmed → shipped → delivered → in_payment → paid
//! ```
//!
//! Every write is conditional on the status pair the caller read, so two
//! racing transitions cannot both apply.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::inventory::apply_movement;
use crate::repository::{document_number, ensure_exists, generate_id};
use crate::retry::retry_on_conflict;
use stockline_core::delivery::DeliveryProgress;
use stockline_core::ledger::{Movement, MovementReason};
use stockline_core::sales::{
    self, FulfillmentStatus, NewSalesOrder, ReversalOutcome, SalesOrder, SalesOrderDetail,
    SalesOrderItem, SalesOrderStatus,
};
use stockline_core::tax::{document_totals, price_line};
use stockline_core::validation::validate_actor;
use stockline_core::{LedgerPolicy, StockKey, ValidationError};

/// Repository for sales orders.
#[derive(Debug, Clone)]
pub struct SalesOrderRepository {
    pool: SqlitePool,
    policy: LedgerPolicy,
}

impl SalesOrderRepository {
    pub fn new(pool: SqlitePool, policy: LedgerPolicy) -> Self {
        SalesOrderRepository { pool, policy }
    }

    /// Creates a New/draft order with priced items.
    pub async fn create(&self, request: &NewSalesOrder) -> DbResult<SalesOrderDetail> {
        request.validate()?;

        let mut tx = self.pool.begin().await?;
        ensure_exists(&mut *tx, "customers", "customer_id", &request.customer_id).await?;
        ensure_exists(&mut *tx, "stores", "store_id", &request.store_id).await?;

        let now = Utc::now();
        let pricing_mode = request.pricing_mode.unwrap_or(self.policy.sales_pricing);
        let order_id = generate_id();
        let order_number = document_number("SO", request.order_date);

        let mut priced = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            ensure_exists(&mut *tx, "products", "product_id", &line.product_id).await?;
            priced.push(price_line(line.quantity, line.unit_price_cents, line.tax_type, pricing_mode)?);
        }
        let totals = document_totals(&priced)?;

        sqlx::query(
            r#"
            INSERT INTO sales_orders (
                id, order_number, customer_id, store_id, order_date, status, my_status,
                pricing_mode, rider_id, stock_reversed, subtotal_cents, tax_cents, total_cents,
                notes, created_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, 0, ?9, ?10, ?11, ?12, ?13, ?14, ?14)
            "#,
        )
        .bind(&order_id)
        .bind(&order_number)
        .bind(&request.customer_id)
        .bind(&request.store_id)
        .bind(request.order_date)
        .bind(SalesOrderStatus::Draft)
        .bind(FulfillmentStatus::New)
        .bind(pricing_mode)
        .bind(totals.subtotal_cents)
        .bind(totals.tax_cents)
        .bind(totals.total_cents)
        .bind(&request.notes)
        .bind(&request.actor_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for (line, pricing) in request.lines.iter().zip(&priced) {
            sqlx::query(
                r#"
                INSERT INTO sales_order_items (
                    id, sales_order_id, product_id, quantity, unit_price_cents, tax_type,
                    net_price_cents, tax_amount_cents, total_price_cents, shipped_quantity
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0)
                "#,
            )
            .bind(generate_id())
            .bind(&order_id)
            .bind(&line.product_id)
            .bind(line.quantity)
            .bind(line.unit_price_cents)
            .bind(line.tax_type)
            .bind(pricing.net_price_cents)
            .bind(pricing.tax_amount_cents)
            .bind(pricing.total_price_cents)
            .execute(&mut *tx)
            .await?;
        }

        let detail = load_detail(&mut tx, &order_id).await?;
        tx.commit().await?;

        info!(
            id = %detail.order.id,
            number = %detail.order.order_number,
            store_id = %detail.order.store_id,
            total_cents = detail.order.total_cents,
            "Sales order created"
        );
        Ok(detail)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<SalesOrderDetail>> {
        let mut conn = self.pool.acquire().await?;
        match load_detail(&mut conn, id).await {
            Ok(detail) => Ok(Some(detail)),
            Err(DbError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Headers, newest first, optionally filtered by fulfillment status.
    pub async fn list(&self, my_status: Option<FulfillmentStatus>) -> DbResult<Vec<SalesOrder>> {
        let orders = sqlx::query_as::<_, SalesOrder>(
            r#"
            SELECT * FROM sales_orders
            WHERE (?1 IS NULL OR my_status = ?1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(my_status)
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// New → Approved, draft → confirmed.
    pub async fn approve(&self, id: &str, actor_id: &str) -> DbResult<SalesOrder> {
        self.transition(id, actor_id, "approved", sales::approve).await
    }

    /// New → Declined, → cancelled.
    pub async fn decline(&self, id: &str, actor_id: &str) -> DbResult<SalesOrder> {
        self.transition(id, actor_id, "declined", sales::decline).await
    }

    /// Approved → In Transit. A rider must already be assigned.
    pub async fn dispatch(&self, id: &str, actor_id: &str) -> DbResult<SalesOrder> {
        self.transition(id, actor_id, "dispatched", |order| {
            Ok((sales::dispatch(order)?, order.status))
        })
        .await
    }

    /// Completes an order with unshipped quantity. Requires the
    /// `explicit_close` partial delivery policy.
    pub async fn close_short(&self, id: &str, actor_id: &str) -> DbResult<SalesOrder> {
        validate_actor(actor_id)?;

        let mut tx = self.pool.begin().await?;
        let order = fetch_order(&mut tx, id).await?;
        let open = open_delivery_notes(&mut tx, id).await?;
        let (my_status, status) = sales::close_short(&order, open, self.policy.partial_delivery)?;

        set_progress(&mut tx, &order, my_status, status).await?;
        let order = fetch_order(&mut tx, id).await?;
        tx.commit().await?;

        info!(id = %id, actor_id = %actor_id, "Sales order closed short");
        Ok(order)
    }

    async fn transition<F>(
        &self,
        id: &str,
        actor_id: &str,
        label: &'static str,
        rule: F,
    ) -> DbResult<SalesOrder>
    where
        F: Fn(&SalesOrder) -> stockline_core::CoreResult<(FulfillmentStatus, SalesOrderStatus)>,
    {
        validate_actor(actor_id)?;

        let mut tx = self.pool.begin().await?;
        let order = fetch_order(&mut tx, id).await?;
        let (my_status, status) = rule(&order)?;

        set_progress(&mut tx, &order, my_status, status).await?;
        let order = fetch_order(&mut tx, id).await?;
        tx.commit().await?;

        info!(id = %id, actor_id = %actor_id, my_status = ?order.my_status, "Sales order {}", label);
        Ok(order)
    }

    /// Assigns a rider. Legal only while the order is Approved.
    pub async fn assign_rider(&self, id: &str, rider_id: &str, actor_id: &str) -> DbResult<SalesOrder> {
        validate_actor(actor_id)?;

        let mut tx = self.pool.begin().await?;
        let order = fetch_order(&mut tx, id).await?;
        sales::ensure_rider_assignable(&order)?;
        ensure_active_rider(&mut tx, rider_id).await?;

        let result = sqlx::query(
            r#"
            UPDATE sales_orders SET rider_id = ?2, updated_at = ?4
            WHERE id = ?1 AND my_status = ?3
            "#,
        )
        .bind(id)
        .bind(rider_id)
        .bind(FulfillmentStatus::Approved)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::ConcurrencyConflict(format!(
                "sales order {} left Approved during rider assignment",
                id
            )));
        }

        let order = fetch_order(&mut tx, id).await?;
        tx.commit().await?;

        info!(id = %id, rider_id = %rider_id, actor_id = %actor_id, "Rider assigned to sales order");
        Ok(order)
    }

    /// Cancels the order and every open delivery note on it. Shipped stock
    /// stays out until [`Self::receive_back_to_stock`].
    pub async fn cancel(&self, id: &str, actor_id: &str) -> DbResult<SalesOrder> {
        validate_actor(actor_id)?;

        let mut tx = self.pool.begin().await?;
        let order = fetch_order(&mut tx, id).await?;
        let (my_status, status) = sales::cancel(&order)?;

        set_progress(&mut tx, &order, my_status, status).await?;

        let notes = sqlx::query(
            r#"
            UPDATE delivery_notes SET my_status = ?2, status = 'cancelled', updated_at = ?3
            WHERE sales_order_id = ?1 AND my_status IN (?4, ?5, ?6)
            "#,
        )
        .bind(id)
        .bind(DeliveryProgress::Cancelled)
        .bind(Utc::now())
        .bind(DeliveryProgress::Draft)
        .bind(DeliveryProgress::Prepared)
        .bind(DeliveryProgress::InTransit)
        .execute(&mut *tx)
        .await?;

        let order = fetch_order(&mut tx, id).await?;
        tx.commit().await?;

        info!(
            id = %id,
            cancelled_notes = notes.rows_affected(),
            actor_id = %actor_id,
            "Sales order cancelled"
        );
        Ok(order)
    }

    // =========================================================================
    // Stock Reversal
    // =========================================================================

    /// Returns every shipped unit of a cancelled order to its store.
    ///
    /// Idempotent: the first call restores exactly what shipped, zeroes the
    /// shipped counters and sets `stock_reversed`; later calls restore nothing.
    pub async fn receive_back_to_stock(&self, id: &str, actor_id: &str) -> DbResult<ReversalOutcome> {
        validate_actor(actor_id)?;
        retry_on_conflict("receive_back_to_stock", || self.reverse_once(id, actor_id)).await
    }

    async fn reverse_once(&self, id: &str, actor_id: &str) -> DbResult<ReversalOutcome> {
        let mut tx = self.pool.begin().await?;
        let order = fetch_order(&mut tx, id).await?;
        let items = fetch_items(&mut tx, id).await?;
        let plan = sales::plan_reversal(&order, &items)?;

        if order.stock_reversed {
            debug!(id = %id, "Stock already reversed");
            return Ok(ReversalOutcome {
                sales_order_id: order.id,
                store_id: order.store_id,
                restored: plan,
            });
        }

        let now = Utc::now();
        let flagged = sqlx::query(
            "UPDATE sales_orders SET stock_reversed = 1, updated_at = ?2 WHERE id = ?1 AND stock_reversed = 0",
        )
        .bind(id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        if flagged.rows_affected() == 0 {
            return Err(DbError::ConcurrencyConflict(format!(
                "sales order {} reversed concurrently",
                id
            )));
        }

        for line in &plan {
            let zeroed = sqlx::query(
                "UPDATE sales_order_items SET shipped_quantity = 0 WHERE id = ?1 AND shipped_quantity = ?2",
            )
            .bind(&line.sales_order_item_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
            if zeroed.rows_affected() == 0 {
                return Err(DbError::ConcurrencyConflict(format!(
                    "sales order item {} changed during reversal",
                    line.sales_order_item_id
                )));
            }

            let movement = Movement::new(
                StockKey::new(&order.store_id, &line.product_id),
                line.quantity,
                MovementReason::ShipmentReversal,
                actor_id,
            )
            .reference(&order.id);
            apply_movement(&mut tx, &movement, now).await?;
        }

        tx.commit().await?;

        info!(
            id = %id,
            store_id = %order.store_id,
            lines = plan.len(),
            units = plan.iter().map(|l| l.quantity).sum::<i64>(),
            actor_id = %actor_id,
            "Shipped stock received back"
        );

        Ok(ReversalOutcome {
            sales_order_id: order.id,
            store_id: order.store_id,
            restored: plan,
        })
    }
}

// =============================================================================
// Helpers (shared with delivery and invoice repositories)
// =============================================================================

pub(crate) async fn fetch_order(conn: &mut SqliteConnection, id: &str) -> DbResult<SalesOrder> {
    sqlx::query_as::<_, SalesOrder>("SELECT * FROM sales_orders WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("SalesOrder", id))
}

pub(crate) async fn fetch_items(
    conn: &mut SqliteConnection,
    order_id: &str,
) -> DbResult<Vec<SalesOrderItem>> {
    let items = sqlx::query_as::<_, SalesOrderItem>(
        "SELECT * FROM sales_order_items WHERE sales_order_id = ?1 ORDER BY rowid",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(items)
}

async fn load_detail(conn: &mut SqliteConnection, id: &str) -> DbResult<SalesOrderDetail> {
    let order = fetch_order(conn, id).await?;
    let items = fetch_items(conn, id).await?;
    Ok(SalesOrderDetail { order, items })
}

/// Number of Draft/Prepared/In Transit notes on an order.
pub(crate) async fn open_delivery_notes(conn: &mut SqliteConnection, order_id: &str) -> DbResult<usize> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM delivery_notes WHERE sales_order_id = ?1 AND my_status IN (?2, ?3, ?4)",
    )
    .bind(order_id)
    .bind(DeliveryProgress::Draft)
    .bind(DeliveryProgress::Prepared)
    .bind(DeliveryProgress::InTransit)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count as usize)
}

/// Writes a new status pair, conditional on the pair the caller read.
pub(crate) async fn set_progress(
    conn: &mut SqliteConnection,
    order: &SalesOrder,
    my_status: FulfillmentStatus,
    status: SalesOrderStatus,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE sales_orders SET my_status = ?4, status = ?5, updated_at = ?6
        WHERE id = ?1 AND my_status = ?2 AND status = ?3
        "#,
    )
    .bind(&order.id)
    .bind(order.my_status)
    .bind(order.status)
    .bind(my_status)
    .bind(status)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::ConcurrencyConflict(format!(
            "sales order {} changed status concurrently",
            order.id
        )));
    }
    debug!(
        id = %order.id,
        from = ?order.my_status,
        to = ?my_status,
        status = ?status,
        "Sales order progress set"
    );
    Ok(())
}

/// Riders must exist and be active to take an assignment.
pub(crate) async fn ensure_active_rider(conn: &mut SqliteConnection, rider_id: &str) -> DbResult<()> {
    let active: Option<bool> = sqlx::query_scalar("SELECT is_active FROM riders WHERE id = ?1")
        .bind(rider_id)
        .fetch_optional(&mut *conn)
        .await?;

    match active {
        Some(true) => Ok(()),
        _ => Err(ValidationError::UnknownReference {
            field: "rider_id".to_string(),
            value: rider_id.to_string(),
        }
        .into()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{line, today, world, ACTOR};
    use stockline_core::policy::PartialDeliveryPolicy;
    use stockline_core::CoreError;

    #[tokio::test]
    async fn test_create_and_approve() {
        let w = world().await;
        let detail = w.approved_order(20).await;

        assert_eq!(detail.order.my_status, FulfillmentStatus::Approved);
        assert_eq!(detail.order.status, SalesOrderStatus::Confirmed);
        assert!(detail.order.order_number.starts_with("SO-"));
        assert_eq!(detail.items[0].shipped_quantity, 0);

        let err = w.db.sales().approve(&detail.order.id, ACTOR).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidStateTransition { .. })));
    }

    #[tokio::test]
    async fn test_decline_new_order() {
        let w = world().await;
        let sales = w.db.sales();
        let detail = sales
            .create(&NewSalesOrder {
                customer_id: w.customer.id.clone(),
                store_id: w.store.id.clone(),
                order_date: today(),
                pricing_mode: None,
                lines: vec![line(&w.product, 1, 100)],
                notes: None,
                actor_id: ACTOR.to_string(),
            })
            .await
            .unwrap();

        let declined = sales.decline(&detail.order.id, ACTOR).await.unwrap();
        assert_eq!(declined.my_status, FulfillmentStatus::Declined);
        assert_eq!(declined.status, SalesOrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_rider_only_at_approved() {
        let w = world().await;
        let order = w.approved_order(5).await;
        let sales = w.db.sales();

        let err = sales.dispatch(&order.order.id, ACTOR).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));

        let err = sales.assign_rider(&order.order.id, "ghost", ACTOR).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::UnknownReference { .. }))
        ));

        let assigned = sales.assign_rider(&order.order.id, &w.rider.id, ACTOR).await.unwrap();
        assert_eq!(assigned.rider_id.as_deref(), Some(w.rider.id.as_str()));

        let dispatched = sales.dispatch(&order.order.id, ACTOR).await.unwrap();
        assert_eq!(dispatched.my_status, FulfillmentStatus::InTransit);

        let err = sales.assign_rider(&order.order.id, &w.rider.id, ACTOR).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidStateTransition { .. })));
    }

    #[tokio::test]
    async fn test_close_short_requires_policy() {
        let w = world().await;
        let order = w.approved_order(5).await;

        let err = w.db.sales().close_short(&order.order.id, ACTOR).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::PartialCloseNotAllowed { .. })));

        let relaxed = SalesOrderRepository::new(
            w.db.pool().clone(),
            LedgerPolicy {
                partial_delivery: PartialDeliveryPolicy::ExplicitClose,
                ..*w.db.policy()
            },
        );
        let closed = relaxed.close_short(&order.order.id, ACTOR).await.unwrap();
        assert_eq!(closed.my_status, FulfillmentStatus::Complete);
        assert_eq!(closed.status, SalesOrderStatus::Delivered);
    }

    #[tokio::test]
    async fn test_cancel_without_shipment_then_reversal_is_empty() {
        let w = world().await;
        let order = w.approved_order(5).await;
        let sales = w.db.sales();

        let err = sales.receive_back_to_stock(&order.order.id, ACTOR).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidStateTransition { .. })));

        let cancelled = sales.cancel(&order.order.id, ACTOR).await.unwrap();
        assert_eq!(cancelled.my_status, FulfillmentStatus::Cancelled);

        let outcome = sales.receive_back_to_stock(&order.order.id, ACTOR).await.unwrap();
        assert!(outcome.restored.is_empty());

        let reloaded = sales.get(&order.order.id).await.unwrap().unwrap();
        assert!(reloaded.order.stock_reversed);
    }
}
