//! # Inventory Repository
//!
//! The only code that writes `inventory_lines` and `inventory_transactions`.
//!
//! ## One Movement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      apply_movement (inside caller's tx)                │
//! │                                                                         │
//! │  1. INSERT line (qty 0) ON CONFLICT DO NOTHING     ← lazy creation      │
//! │  2. UPDATE line SET quantity = quantity + Δ                             │
//! │        WHERE key AND (override OR quantity + Δ >= 0)                    │
//! │        RETURNING quantity                                               │
//! │         │                                                               │
//! │         ├── row returned → 3                                            │
//! │         └── no row       → NegativeInventory (nothing written)          │
//! │  3. INSERT inventory_transactions (Δ, quantity_after, reason, actor)    │
//! │                                                                         │
//! │  Step 2 is a single statement, so the bound check and the increment     │
//! │  cannot interleave with another writer.                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Document workflows (receiving, delivery, reversal, stock take, opening
//! balances) call [`apply_movement`] on their own transaction so the ledger
//! moves together with the document counters or not at all.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::{ensure_exists, generate_id};
use crate::retry::retry_on_conflict;
use stockline_core::ledger::{
    build_stock_summary, check_movement, end_of_day, replay, AdjustStockRequest,
    AdjustmentOutcome, InventoryLine, InventoryTransaction, Movement, MovementReason,
    StockSnapshot, StockSummary,
};
use stockline_core::opening::{check_batch, OpeningBalance, OpeningBalanceInput};
use stockline_core::{CoreError, Product, StockKey, Store, ValidationError};

/// Reference stamped on opening balance movements.
const OPENING_REFERENCE: &str = "opening-balance";

// =============================================================================
// Ledger Primitive
// =============================================================================

/// Applies one movement on the caller's connection (normally a transaction).
///
/// ## Errors
/// - `Validation(MustBeNonZero)` for a zero delta
/// - `NegativeInventory` when the line would drop below zero without an
///   effective override
pub(crate) async fn apply_movement(
    conn: &mut SqliteConnection,
    movement: &Movement,
    occurred_at: DateTime<Utc>,
) -> DbResult<AdjustmentOutcome> {
    if movement.delta == 0 {
        return Err(ValidationError::MustBeNonZero {
            field: "delta".to_string(),
        }
        .into());
    }

    let key = &movement.key;

    sqlx::query(
        r#"
        INSERT INTO inventory_lines (store_id, product_id, quantity, updated_at)
        VALUES (?1, ?2, 0, ?3)
        ON CONFLICT (store_id, product_id) DO NOTHING
        "#,
    )
    .bind(&key.store_id)
    .bind(&key.product_id)
    .bind(occurred_at)
    .execute(&mut *conn)
    .await?;

    let updated: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE inventory_lines
        SET quantity = quantity + ?3, updated_at = ?4
        WHERE store_id = ?1 AND product_id = ?2
          AND (?5 OR quantity + ?3 >= 0)
        RETURNING quantity
        "#,
    )
    .bind(&key.store_id)
    .bind(&key.product_id)
    .bind(movement.delta)
    .bind(occurred_at)
    .bind(movement.negative_permitted())
    .fetch_optional(&mut *conn)
    .await?;

    let quantity = match updated {
        Some(quantity) => quantity,
        None => {
            let on_hand: i64 = sqlx::query_scalar(
                "SELECT quantity FROM inventory_lines WHERE store_id = ?1 AND product_id = ?2",
            )
            .bind(&key.store_id)
            .bind(&key.product_id)
            .fetch_one(&mut *conn)
            .await?;

            check_movement(on_hand, movement)?;
            // The guarded UPDATE refused but the rule passes: the line moved
            // between the two statements.
            return Err(DbError::ConcurrencyConflict(format!(
                "inventory line {}/{} changed during update",
                key.store_id, key.product_id
            )));
        }
    };

    let transaction_id = generate_id();
    sqlx::query(
        r#"
        INSERT INTO inventory_transactions (
            id, store_id, product_id, delta, quantity_after, reason,
            reference_id, actor_id, note, occurred_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&transaction_id)
    .bind(&key.store_id)
    .bind(&key.product_id)
    .bind(movement.delta)
    .bind(quantity)
    .bind(movement.reason)
    .bind(&movement.reference_id)
    .bind(&movement.actor_id)
    .bind(&movement.note)
    .bind(occurred_at)
    .execute(&mut *conn)
    .await?;

    debug!(
        store_id = %key.store_id,
        product_id = %key.product_id,
        delta = movement.delta,
        quantity,
        reason = ?movement.reason,
        "Ledger moved"
    );

    Ok(AdjustmentOutcome {
        transaction_id,
        store_id: key.store_id.clone(),
        product_id: key.product_id.clone(),
        delta: movement.delta,
        quantity,
    })
}

/// Current quantity on the caller's connection; 0 for a line never created.
pub(crate) async fn on_hand(
    conn: &mut SqliteConnection,
    store_id: &str,
    product_id: &str,
) -> DbResult<i64> {
    let quantity: Option<i64> = sqlx::query_scalar(
        "SELECT quantity FROM inventory_lines WHERE store_id = ?1 AND product_id = ?2",
    )
    .bind(store_id)
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(quantity.unwrap_or(0))
}

// =============================================================================
// Repository
// =============================================================================

/// Ledger reads, manual adjustments, opening balances and projections.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Moves one line by `delta` and records the transaction.
    ///
    /// `allow_negative` is honored only for `manual_correction`.
    pub async fn adjust(&self, request: &AdjustStockRequest) -> DbResult<AdjustmentOutcome> {
        request.validate()?;
        let movement = request.movement();

        retry_on_conflict("adjust", || self.adjust_once(&movement)).await
    }

    async fn adjust_once(&self, movement: &Movement) -> DbResult<AdjustmentOutcome> {
        let mut tx = self.pool.begin().await?;

        ensure_exists(&mut *tx, "stores", "store_id", &movement.key.store_id).await?;
        ensure_exists(&mut *tx, "products", "product_id", &movement.key.product_id).await?;
        let outcome = apply_movement(&mut *tx, movement, Utc::now()).await?;

        tx.commit().await?;

        info!(
            store_id = %outcome.store_id,
            product_id = %outcome.product_id,
            delta = outcome.delta,
            quantity = outcome.quantity,
            actor_id = %movement.actor_id,
            "Stock adjusted"
        );
        Ok(outcome)
    }

    /// Current quantity of a product in a store (0 if it never moved).
    pub async fn read(&self, store_id: &str, product_id: &str) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        on_hand(&mut conn, store_id, product_id).await
    }

    /// Every line of one store.
    pub async fn lines_for_store(&self, store_id: &str) -> DbResult<Vec<InventoryLine>> {
        let lines = sqlx::query_as::<_, InventoryLine>(
            "SELECT * FROM inventory_lines WHERE store_id = ?1 ORDER BY product_id",
        )
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(lines)
    }

    /// Quantities as they stood at the end of `date`, replayed from the log.
    pub async fn snapshot_as_of(&self, date: NaiveDate) -> DbResult<StockSnapshot> {
        let log = sqlx::query_as::<_, InventoryTransaction>(
            "SELECT * FROM inventory_transactions ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        let as_of = end_of_day(date);
        let snapshot = StockSnapshot::from_replay(as_of, replay(&log, as_of));

        debug!(as_of = %date, lines = snapshot.lines.len(), "Snapshot replayed");
        Ok(snapshot)
    }

    /// Product × store quantity matrix.
    pub async fn stock_summary(&self) -> DbResult<StockSummary> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE is_active = 1 ORDER BY code",
        )
        .fetch_all(&self.pool)
        .await?;
        let stores = sqlx::query_as::<_, Store>("SELECT * FROM stores ORDER BY code")
            .fetch_all(&self.pool)
            .await?;
        let lines = sqlx::query_as::<_, InventoryLine>("SELECT * FROM inventory_lines")
            .fetch_all(&self.pool)
            .await?;

        Ok(build_stock_summary(&products, &stores, &lines))
    }

    /// Movement history, newest first, optionally narrowed to a store and/or
    /// product.
    pub async fn transactions(
        &self,
        store_id: Option<&str>,
        product_id: Option<&str>,
        limit: u32,
    ) -> DbResult<Vec<InventoryTransaction>> {
        let transactions = sqlx::query_as::<_, InventoryTransaction>(
            r#"
            SELECT * FROM inventory_transactions
            WHERE (?1 IS NULL OR store_id = ?1)
              AND (?2 IS NULL OR product_id = ?2)
            ORDER BY rowid DESC
            LIMIT ?3
            "#,
        )
        .bind(store_id)
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(transactions)
    }

    // =========================================================================
    // Opening Balances
    // =========================================================================

    /// Records a batch of opening quantities, all or nothing.
    ///
    /// ## Errors
    /// `DuplicateOpeningBalance` listing every pair that already has an
    /// opening balance or repeats inside the batch. Nothing is written.
    pub async fn save_opening_quantities(
        &self,
        items: &[OpeningBalanceInput],
        actor_id: &str,
    ) -> DbResult<Vec<OpeningBalance>> {
        retry_on_conflict("save_opening_quantities", || {
            self.save_opening_once(items, actor_id)
        })
        .await
    }

    async fn save_opening_once(
        &self,
        items: &[OpeningBalanceInput],
        actor_id: &str,
    ) -> DbResult<Vec<OpeningBalance>> {
        let mut tx = self.pool.begin().await?;

        let mut existing = HashSet::new();
        for item in items {
            let recorded: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM opening_balances WHERE store_id = ?1 AND product_id = ?2)",
            )
            .bind(&item.store_id)
            .bind(&item.product_id)
            .fetch_one(&mut *tx)
            .await?;
            if recorded {
                existing.insert(item.key());
            }
        }
        check_batch(items, &existing, actor_id)?;

        let now = Utc::now();
        let mut saved = Vec::with_capacity(items.len());

        for item in items {
            ensure_exists(&mut *tx, "stores", "store_id", &item.store_id).await?;
            ensure_exists(&mut *tx, "products", "product_id", &item.product_id).await?;

            sqlx::query(
                r#"
                INSERT INTO opening_balances (store_id, product_id, opening_quantity, recorded_by, recorded_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(&item.store_id)
            .bind(&item.product_id)
            .bind(item.opening_quantity)
            .bind(actor_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { .. } => DbError::Domain(CoreError::DuplicateOpeningBalance {
                    duplicates: vec![item.key()],
                }),
                other => other,
            })?;

            if item.opening_quantity > 0 {
                let movement = Movement::new(
                    StockKey::new(&item.store_id, &item.product_id),
                    item.opening_quantity,
                    MovementReason::OpeningBalance,
                    actor_id,
                )
                .reference(OPENING_REFERENCE);
                apply_movement(&mut *tx, &movement, now).await?;
            }

            saved.push(OpeningBalance {
                store_id: item.store_id.clone(),
                product_id: item.product_id.clone(),
                opening_quantity: item.opening_quantity,
                recorded_by: actor_id.to_string(),
                recorded_at: now,
            });
        }

        tx.commit().await?;

        info!(count = saved.len(), actor_id = %actor_id, "Opening quantities saved");
        Ok(saved)
    }

    pub async fn opening_balances(&self) -> DbResult<Vec<OpeningBalance>> {
        let balances = sqlx::query_as::<_, OpeningBalance>(
            "SELECT * FROM opening_balances ORDER BY store_id, product_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(balances)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{today, world, ACTOR};
    use chrono::Duration;

    fn adjust(store: &str, product: &str, delta: i64) -> AdjustStockRequest {
        AdjustStockRequest {
            store_id: store.to_string(),
            product_id: product.to_string(),
            delta,
            reason: MovementReason::ManualCorrection,
            allow_negative: false,
            reference_id: None,
            note: None,
            actor_id: ACTOR.to_string(),
        }
    }

    #[tokio::test]
    async fn test_adjust_creates_line_and_transaction() {
        let w = world().await;
        let inventory = w.db.inventory();

        assert_eq!(inventory.read(&w.store.id, &w.product.id).await.unwrap(), 0);

        let outcome = inventory.adjust(&adjust(&w.store.id, &w.product.id, 25)).await.unwrap();
        assert_eq!(outcome.quantity, 25);

        let outcome = inventory.adjust(&adjust(&w.store.id, &w.product.id, -5)).await.unwrap();
        assert_eq!(outcome.quantity, 20);

        let history = inventory
            .transactions(Some(&w.store.id), Some(&w.product.id), 10)
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].delta, -5);
        assert_eq!(history[0].quantity_after, 20);
        assert_eq!(history.iter().map(|t| t.delta).sum::<i64>(), 20);
    }

    #[tokio::test]
    async fn test_adjust_rejects_negative_without_override() {
        let w = world().await;
        let inventory = w.db.inventory();
        w.stock(&w.store, &w.product, 3).await;

        let err = inventory
            .adjust(&adjust(&w.store.id, &w.product.id, -4))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::NegativeInventory { on_hand: 3, delta: -4, .. })
        ));
        assert_eq!(w.on_hand(&w.store, &w.product).await, 3);

        let mut request = adjust(&w.store.id, &w.product.id, -4);
        request.allow_negative = true;
        assert_eq!(inventory.adjust(&request).await.unwrap().quantity, -1);
    }

    #[tokio::test]
    async fn test_override_ignored_for_non_manual_reason() {
        let w = world().await;
        let mut request = adjust(&w.store.id, &w.product.id, -1);
        request.reason = MovementReason::StockTake;
        request.allow_negative = true;

        let err = w.db.inventory().adjust(&request).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::NegativeInventory { .. })));
    }

    #[tokio::test]
    async fn test_adjust_unknown_store_and_zero_delta() {
        let w = world().await;
        let inventory = w.db.inventory();

        let err = inventory.adjust(&adjust("nope", &w.product.id, 1)).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::UnknownReference { .. }))
        ));

        let err = inventory
            .adjust(&adjust(&w.store.id, &w.product.id, 0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::MustBeNonZero { .. }))
        ));
    }

    #[tokio::test]
    async fn test_adjust_rejects_oversized_delta() {
        let w = world().await;
        let inventory = w.db.inventory();
        w.stock(&w.store, &w.product, 1).await;

        let err = inventory
            .adjust(&adjust(&w.store.id, &w.product.id, i64::MAX))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
        assert_eq!(w.on_hand(&w.store, &w.product).await, 1);
    }

    #[tokio::test]
    async fn test_snapshot_replays_up_to_date() {
        let w = world().await;
        w.stock(&w.store, &w.product, 12).await;
        w.stock(&w.other_store, &w.product, 4).await;

        let inventory = w.db.inventory();

        let yesterday = inventory.snapshot_as_of(today() - Duration::days(1)).await.unwrap();
        assert!(yesterday.lines.is_empty());

        let now = inventory.snapshot_as_of(today()).await.unwrap();
        assert_eq!(now.quantity(&w.store.id, &w.product.id), 12);
        assert_eq!(now.quantity(&w.other_store.id, &w.product.id), 4);
    }

    #[tokio::test]
    async fn test_stock_summary_matrix() {
        let w = world().await;
        w.stock(&w.store, &w.product, 7).await;
        w.stock(&w.other_store, &w.product, 2).await;

        let summary = w.db.inventory().stock_summary().await.unwrap();
        assert_eq!(summary.stores.len(), 2);
        assert_eq!(summary.rows.len(), 2);

        let row = summary
            .rows
            .iter()
            .find(|r| r.product_id == w.product.id)
            .unwrap();
        assert_eq!(row.quantities[&w.store.id], 7);
        assert_eq!(row.quantities[&w.other_store.id], 2);
        assert_eq!(row.total, 9);

        let untouched = summary
            .rows
            .iter()
            .find(|r| r.product_id == w.other_product.id)
            .unwrap();
        assert_eq!(untouched.total, 0);
        assert!(untouched.below_reorder);
    }

    #[tokio::test]
    async fn test_opening_quantities_saved_once() {
        let w = world().await;
        let inventory = w.db.inventory();

        let batch = vec![
            OpeningBalanceInput {
                store_id: w.store.id.clone(),
                product_id: w.product.id.clone(),
                opening_quantity: 30,
            },
            OpeningBalanceInput {
                store_id: w.store.id.clone(),
                product_id: w.other_product.id.clone(),
                opening_quantity: 0,
            },
        ];
        let saved = inventory.save_opening_quantities(&batch, ACTOR).await.unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(w.on_hand(&w.store, &w.product).await, 30);

        // Zero quantity records the balance without a movement.
        let history = inventory.transactions(None, Some(&w.other_product.id), 10).await.unwrap();
        assert!(history.is_empty());
        assert_eq!(inventory.opening_balances().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_opening_duplicate_rejects_whole_batch() {
        let w = world().await;
        let inventory = w.db.inventory();

        let first = OpeningBalanceInput {
            store_id: w.store.id.clone(),
            product_id: w.product.id.clone(),
            opening_quantity: 10,
        };
        inventory
            .save_opening_quantities(std::slice::from_ref(&first), ACTOR)
            .await
            .unwrap();

        let fresh = OpeningBalanceInput {
            store_id: w.other_store.id.clone(),
            product_id: w.product.id.clone(),
            opening_quantity: 8,
        };
        let err = inventory
            .save_opening_quantities(&[fresh, first.clone()], ACTOR)
            .await
            .unwrap_err();

        match err {
            DbError::Domain(CoreError::DuplicateOpeningBalance { duplicates }) => {
                assert_eq!(duplicates, vec![first.key()]);
            }
            other => panic!("expected DuplicateOpeningBalance, got {:?}", other),
        }

        // The fresh pair in the rejected batch was not written.
        assert_eq!(w.on_hand(&w.other_store, &w.product).await, 0);
        assert_eq!(w.on_hand(&w.store, &w.product).await, 10);
    }
}
