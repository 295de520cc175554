//! # Stock Take Repository
//!
//! Posts a physical count: every product whose count differs from the ledger
//! gets one `stock_take` movement of `counted - system`, and the report
//! records what was changed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::DbResult;
use crate::repository::inventory::apply_movement;
use crate::repository::{ensure_exists, generate_id};
use crate::retry::retry_on_conflict;
use stockline_core::ledger::{Movement, MovementReason};
use stockline_core::stock_take::{reconcile, StockAdjustment, StockTakeReport, StockTakeRequest};
use stockline_core::{LedgerPolicy, StockKey};

#[derive(Debug, sqlx::FromRow)]
struct StockTakeRow {
    id: String,
    store_id: String,
    staff_id: String,
    taken_at: DateTime<Utc>,
}

/// Repository for stock takes.
#[derive(Debug, Clone)]
pub struct StockTakeRepository {
    pool: SqlitePool,
    policy: LedgerPolicy,
}

impl StockTakeRepository {
    pub fn new(pool: SqlitePool, policy: LedgerPolicy) -> Self {
        StockTakeRepository { pool, policy }
    }

    /// Reconciles a count against the ledger and posts the differences.
    ///
    /// Counting the same quantities again right after yields an empty
    /// report and no movements.
    pub async fn post_stock_take(&self, request: &StockTakeRequest) -> DbResult<StockTakeReport> {
        request.validate()?;
        retry_on_conflict("post_stock_take", || self.post_once(request)).await
    }

    async fn post_once(&self, request: &StockTakeRequest) -> DbResult<StockTakeReport> {
        let mut tx = self.pool.begin().await?;

        ensure_exists(&mut *tx, "stores", "store_id", &request.store_id).await?;
        for count in &request.counts {
            ensure_exists(&mut *tx, "products", "product_id", &count.product_id).await?;
        }

        let system = system_quantities(&mut tx, &request.store_id).await?;
        let adjustments = reconcile(&system, &request.counts, self.policy.negative_count)?;

        let taken_at = Utc::now();
        let stock_take_id = generate_id();

        sqlx::query(
            "INSERT INTO stock_takes (id, store_id, staff_id, notes, taken_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&stock_take_id)
        .bind(&request.store_id)
        .bind(&request.staff_id)
        .bind(&request.notes)
        .bind(taken_at)
        .execute(&mut *tx)
        .await?;

        for adjustment in &adjustments {
            sqlx::query(
                r#"
                INSERT INTO stock_take_lines (
                    stock_take_id, product_id, system_quantity, counted_quantity, diff
                ) VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(&stock_take_id)
            .bind(&adjustment.product_id)
            .bind(adjustment.system_quantity)
            .bind(adjustment.counted_quantity)
            .bind(adjustment.diff)
            .execute(&mut *tx)
            .await?;

            let movement = Movement::new(
                StockKey::new(&request.store_id, &adjustment.product_id),
                adjustment.diff,
                MovementReason::StockTake,
                &request.staff_id,
            )
            .reference(&stock_take_id)
            .note(request.notes.clone());
            apply_movement(&mut tx, &movement, taken_at).await?;
        }

        tx.commit().await?;

        info!(
            id = %stock_take_id,
            store_id = %request.store_id,
            counted = request.counts.len(),
            adjusted = adjustments.len(),
            staff_id = %request.staff_id,
            "Stock take posted"
        );

        Ok(StockTakeReport {
            stock_take_id,
            store_id: request.store_id.clone(),
            staff_id: request.staff_id.clone(),
            taken_at,
            adjustments,
        })
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<StockTakeReport>> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, StockTakeRow>(
            "SELECT id, store_id, staff_id, taken_at FROM stock_takes WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Ok(Some(into_report(&mut conn, row).await?)),
            None => Ok(None),
        }
    }

    /// Stock takes of one store, newest first.
    pub async fn list_for_store(&self, store_id: &str) -> DbResult<Vec<StockTakeReport>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, StockTakeRow>(
            "SELECT id, store_id, staff_id, taken_at FROM stock_takes WHERE store_id = ?1 ORDER BY rowid DESC",
        )
        .bind(store_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut reports = Vec::with_capacity(rows.len());
        for row in rows {
            reports.push(into_report(&mut conn, row).await?);
        }
        debug!(store_id = %store_id, count = reports.len(), "Listed stock takes");
        Ok(reports)
    }
}

/// Product id → ledger quantity for every line of a store.
async fn system_quantities(conn: &mut SqliteConnection, store_id: &str) -> DbResult<HashMap<String, i64>> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT product_id, quantity FROM inventory_lines WHERE store_id = ?1")
            .bind(store_id)
            .fetch_all(&mut *conn)
            .await?;
    Ok(rows.into_iter().collect())
}

async fn into_report(conn: &mut SqliteConnection, row: StockTakeRow) -> DbResult<StockTakeReport> {
    let adjustments = sqlx::query_as::<_, StockAdjustment>(
        r#"
        SELECT product_id, system_quantity, counted_quantity, diff
        FROM stock_take_lines WHERE stock_take_id = ?1 ORDER BY rowid
        "#,
    )
    .bind(&row.id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(StockTakeReport {
        stock_take_id: row.id,
        store_id: row.store_id,
        staff_id: row.staff_id,
        taken_at: row.taken_at,
        adjustments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::test_support::{world, world_with};
    use stockline_core::policy::NegativeCountPolicy;
    use stockline_core::stock_take::StockCount;
    use stockline_core::{CoreError, ValidationError};

    fn request(store_id: &str, counts: &[(&str, i64)]) -> StockTakeRequest {
        StockTakeRequest {
            store_id: store_id.to_string(),
            counts: counts
                .iter()
                .map(|(product_id, qty)| StockCount {
                    product_id: product_id.to_string(),
                    counted_quantity: *qty,
                })
                .collect(),
            staff_id: "staff-7".to_string(),
            notes: Some("Quarter end".to_string()),
        }
    }

    #[tokio::test]
    async fn test_count_below_ledger_posts_difference() {
        let w = world().await;
        w.stock(&w.store, &w.product, 50).await;
        let takes = w.db.stock_takes();
        let req = request(&w.store.id, &[(&w.product.id, 45), (&w.other_product.id, 0)]);

        let report = takes.post_stock_take(&req).await.unwrap();
        assert_eq!(
            report.adjustments,
            vec![StockAdjustment {
                product_id: w.product.id.clone(),
                system_quantity: 50,
                counted_quantity: 45,
                diff: -5,
            }]
        );
        assert_eq!(w.on_hand(&w.store, &w.product).await, 45);

        let history = w
            .db
            .inventory()
            .transactions(Some(&w.store.id), Some(&w.product.id), 1)
            .await
            .unwrap();
        let last = &history[0];
        assert_eq!(last.reason, MovementReason::StockTake);
        assert_eq!(last.delta, -5);
        assert_eq!(last.reference_id.as_deref(), Some(report.stock_take_id.as_str()));

        let again = takes.post_stock_take(&req).await.unwrap();
        assert!(again.adjustments.is_empty());
        assert_eq!(w.on_hand(&w.store, &w.product).await, 45);

        let stored = takes.get(&report.stock_take_id).await.unwrap().unwrap();
        assert_eq!(stored.adjustments, report.adjustments);
        assert_eq!(takes.list_for_store(&w.store.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_never_moved_product_counts_from_zero() {
        let w = world().await;
        let report = w
            .db
            .stock_takes()
            .post_stock_take(&request(&w.other_store.id, &[(&w.other_product.id, 12)]))
            .await
            .unwrap();

        assert_eq!(report.adjustments[0].system_quantity, 0);
        assert_eq!(report.adjustments[0].diff, 12);
        assert_eq!(w.on_hand(&w.other_store, &w.other_product).await, 12);
    }

    #[tokio::test]
    async fn test_negative_count_follows_policy() {
        let w = world().await;
        w.stock(&w.store, &w.product, 4).await;
        let req = request(&w.store.id, &[(&w.product.id, -2)]);

        let err = w.db.stock_takes().post_stock_take(&req).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
        assert_eq!(w.on_hand(&w.store, &w.product).await, 4);

        let clamping = world_with(LedgerPolicy {
            negative_count: NegativeCountPolicy::ClampToZero,
            ..LedgerPolicy::default()
        })
        .await;
        clamping.stock(&clamping.store, &clamping.product, 4).await;
        let report = clamping
            .db
            .stock_takes()
            .post_stock_take(&request(&clamping.store.id, &[(&clamping.product.id, -2)]))
            .await
            .unwrap();
        assert_eq!(report.adjustments[0].diff, -4);
        assert_eq!(clamping.on_hand(&clamping.store, &clamping.product).await, 0);
    }

    #[tokio::test]
    async fn test_unknown_product_rejects_whole_count() {
        let w = world().await;
        w.stock(&w.store, &w.product, 10).await;
        let req = request(&w.store.id, &[(&w.product.id, 8), ("no-such-product", 1)]);

        let err = w.db.stock_takes().post_stock_take(&req).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::UnknownReference { .. }))
        ));
        assert_eq!(w.on_hand(&w.store, &w.product).await, 10);
        assert!(w.db.stock_takes().list_for_store(&w.store.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_count_on_negative_line_is_rejected() {
        let w = world().await;
        w.db.inventory()
            .adjust(&stockline_core::ledger::AdjustStockRequest {
                store_id: w.store.id.clone(),
                product_id: w.product.id.clone(),
                delta: -1,
                reason: MovementReason::ManualCorrection,
                allow_negative: true,
                reference_id: None,
                note: None,
                actor_id: "staff-7".to_string(),
            })
            .await
            .unwrap();

        let req = request(&w.store.id, &[(&w.product.id, i64::MAX)]);
        let err = w.db.stock_takes().post_stock_take(&req).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
        assert_eq!(w.on_hand(&w.store, &w.product).await, -1);
        assert!(w.db.stock_takes().list_for_store(&w.store.id).await.unwrap().is_empty());
    }
}
