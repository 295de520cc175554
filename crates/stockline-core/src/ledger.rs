//! # Inventory Ledger
//!
//! The per (store, product) quantity counter and its append-only movement log.
//!
//! ## Two Records, One Truth
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  inventory_lines                     inventory_transactions             │
//! │  ───────────────                     ──────────────────────             │
//! │  (S1, A) → 100   ◄── running sum ──  +60  receipt      2024-03-01       │
//! │                                      +40  receipt      2024-03-04       │
//! │                                      -12  shipment     2024-03-05       │
//! │                                      +12  reversal     2024-03-06       │
//! │                                                                         │
//! │  read()          answers "how much now"                                 │
//! │  snapshot_as_of  answers "how much on March 1st" by replaying the log   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lines are created lazily on first movement and never deleted, only zeroed.
//! Every movement writes exactly one transaction with the quantity it left
//! behind, so `Σ delta` per key always equals the line's quantity.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{Product, Store};
use crate::validation::{validate_actor, validate_signed_quantity};

// =============================================================================
// Keys and Reasons
// =============================================================================

/// Identity of one inventory line.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockKey {
    pub store_id: String,
    pub product_id: String,
}

impl StockKey {
    pub fn new(store_id: impl Into<String>, product_id: impl Into<String>) -> Self {
        StockKey {
            store_id: store_id.into(),
            product_id: product_id.into(),
        }
    }
}

/// Why the ledger moved.
///
/// Only `ManualCorrection` may honor an `allow_negative` override: receiving,
/// shipping and stock takes never leave a line below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementReason {
    Receipt,
    Shipment,
    ShipmentReversal,
    StockTake,
    OpeningBalance,
    ManualCorrection,
}

impl MovementReason {
    pub fn allows_negative_override(&self) -> bool {
        matches!(self, MovementReason::ManualCorrection)
    }
}

// =============================================================================
// Records
// =============================================================================

/// Current quantity of a product in a store.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InventoryLine {
    pub store_id: String,
    pub product_id: String,
    pub quantity: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// One immutable, dated ledger movement.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InventoryTransaction {
    pub id: String,
    pub store_id: String,
    pub product_id: String,
    pub delta: i64,
    pub quantity_after: i64,
    pub reason: MovementReason,
    /// Receipt, delivery note, order, stock take or opening batch id.
    pub reference_id: Option<String>,
    pub actor_id: String,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub occurred_at: DateTime<Utc>,
}

/// Input to a single ledger movement.
#[derive(Debug, Clone)]
pub struct Movement {
    pub key: StockKey,
    pub delta: i64,
    pub reason: MovementReason,
    pub allow_negative: bool,
    pub reference_id: Option<String>,
    pub actor_id: String,
    pub note: Option<String>,
}

impl Movement {
    /// A movement that must never drive the line negative.
    pub fn new(
        key: StockKey,
        delta: i64,
        reason: MovementReason,
        actor_id: impl Into<String>,
    ) -> Self {
        Movement {
            key,
            delta,
            reason,
            allow_negative: false,
            reference_id: None,
            actor_id: actor_id.into(),
            note: None,
        }
    }

    pub fn reference(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }

    pub fn note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }

    pub fn allow_negative(mut self, allow: bool) -> Self {
        self.allow_negative = allow;
        self
    }

    /// Whether the override is effective. It is ignored for every reason
    /// except manual correction.
    pub fn negative_permitted(&self) -> bool {
        self.allow_negative && self.reason.allows_negative_override()
    }
}

/// A caller-initiated ledger adjustment.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AdjustStockRequest {
    pub store_id: String,
    pub product_id: String,
    pub delta: i64,
    #[serde(default = "manual_correction")]
    pub reason: MovementReason,
    #[serde(default)]
    pub allow_negative: bool,
    pub reference_id: Option<String>,
    pub note: Option<String>,
    pub actor_id: String,
}

fn manual_correction() -> MovementReason {
    MovementReason::ManualCorrection
}

impl AdjustStockRequest {
    /// An adjustment moves by a bounded, non-zero amount.
    pub fn validate(&self) -> CoreResult<()> {
        validate_actor(&self.actor_id)?;
        if self.delta == 0 {
            return Err(ValidationError::MustBeNonZero {
                field: "delta".to_string(),
            }
            .into());
        }
        validate_signed_quantity("delta", self.delta)?;
        Ok(())
    }

    pub fn movement(&self) -> Movement {
        let movement = Movement::new(
            StockKey::new(&self.store_id, &self.product_id),
            self.delta,
            self.reason,
            &self.actor_id,
        )
        .note(self.note.clone())
        .allow_negative(self.allow_negative);

        match &self.reference_id {
            Some(reference) => movement.reference(reference),
            None => movement,
        }
    }
}

/// Result of `adjust`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentOutcome {
    pub transaction_id: String,
    pub store_id: String,
    pub product_id: String,
    pub delta: i64,
    pub quantity: i64,
}

// =============================================================================
// Rules
// =============================================================================

/// Checks a movement against the quantity currently on hand and returns the
/// quantity it would leave behind.
///
/// ## Example
/// ```rust
/// use stockline_core::ledger::{check_movement, Movement, MovementReason, StockKey};
///
/// let take = Movement::new(StockKey::new("S1", "A"), -5, MovementReason::Shipment, "u1");
/// assert_eq!(check_movement(10, &take).unwrap(), 5);
/// assert!(check_movement(3, &take).is_err());
/// ```
pub fn check_movement(on_hand: i64, movement: &Movement) -> CoreResult<i64> {
    if movement.delta == 0 {
        return Err(ValidationError::MustBeNonZero {
            field: "delta".to_string(),
        }
        .into());
    }

    let after = on_hand.checked_add(movement.delta).ok_or_else(|| {
        CoreError::from(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: i64::MIN,
            max: i64::MAX,
        })
    })?;
    if after < 0 && !movement.negative_permitted() {
        return Err(CoreError::NegativeInventory {
            store_id: movement.key.store_id.clone(),
            product_id: movement.key.product_id.clone(),
            on_hand,
            delta: movement.delta,
        });
    }

    Ok(after)
}

/// Last instant of a calendar day (UTC), for "as of date" reporting.
pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    (date.and_time(NaiveTime::MIN) + Duration::days(1) - Duration::nanoseconds(1)).and_utc()
}

/// Replays every movement dated on or before `as_of`.
///
/// Keys whose movements net to zero are kept: a line that existed and was
/// emptied is reported as 0, not omitted.
pub fn replay<'a>(
    transactions: impl IntoIterator<Item = &'a InventoryTransaction>,
    as_of: DateTime<Utc>,
) -> BTreeMap<StockKey, i64> {
    let mut quantities = BTreeMap::new();
    for tx in transactions {
        if tx.occurred_at > as_of {
            continue;
        }
        *quantities
            .entry(StockKey::new(&tx.store_id, &tx.product_id))
            .or_insert(0) += tx.delta;
    }
    quantities
}

// =============================================================================
// Projections
// =============================================================================

/// Historical quantities reconstructed from the movement log.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockSnapshot {
    #[ts(as = "String")]
    pub as_of: DateTime<Utc>,
    pub lines: Vec<SnapshotLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotLine {
    pub store_id: String,
    pub product_id: String,
    pub quantity: i64,
}

impl StockSnapshot {
    pub fn from_replay(as_of: DateTime<Utc>, quantities: BTreeMap<StockKey, i64>) -> Self {
        let lines = quantities
            .into_iter()
            .map(|(key, quantity)| SnapshotLine {
                store_id: key.store_id,
                product_id: key.product_id,
                quantity,
            })
            .collect();
        StockSnapshot { as_of, lines }
    }

    pub fn quantity(&self, store_id: &str, product_id: &str) -> i64 {
        self.lines
            .iter()
            .find(|l| l.store_id == store_id && l.product_id == product_id)
            .map(|l| l.quantity)
            .unwrap_or(0)
    }
}

/// Column header of the stock summary matrix.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StoreColumn {
    pub store_id: String,
    pub code: String,
    pub name: String,
}

/// One product row: quantity per store id plus the total.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockSummaryRow {
    pub product_id: String,
    pub product_code: String,
    pub product_name: String,
    pub unit_of_measure: String,
    pub quantities: BTreeMap<String, i64>,
    pub total: i64,
    pub reorder_level: i64,
    pub below_reorder: bool,
}

/// Per-product, per-store quantity matrix (read-only projection).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockSummary {
    pub stores: Vec<StoreColumn>,
    pub rows: Vec<StockSummaryRow>,
}

/// Builds the summary matrix. Every active product gets a row and every store
/// a cell, zero-filled where no line exists yet.
pub fn build_stock_summary(
    products: &[Product],
    stores: &[Store],
    lines: &[InventoryLine],
) -> StockSummary {
    let on_hand: HashMap<(&str, &str), i64> = lines
        .iter()
        .map(|l| ((l.product_id.as_str(), l.store_id.as_str()), l.quantity))
        .collect();

    let rows = products
        .iter()
        .filter(|p| p.is_active)
        .map(|product| {
            let quantities: BTreeMap<String, i64> = stores
                .iter()
                .map(|store| {
                    let qty = on_hand
                        .get(&(product.id.as_str(), store.id.as_str()))
                        .copied()
                        .unwrap_or(0);
                    (store.id.clone(), qty)
                })
                .collect();
            let total = quantities.values().sum();

            StockSummaryRow {
                product_id: product.id.clone(),
                product_code: product.code.clone(),
                product_name: product.name.clone(),
                unit_of_measure: product.unit_of_measure.clone(),
                quantities,
                total,
                reorder_level: product.reorder_level,
                below_reorder: total < product.reorder_level,
            }
        })
        .collect();

    StockSummary {
        stores: stores
            .iter()
            .map(|s| StoreColumn {
                store_id: s.id.clone(),
                code: s.code.clone(),
                name: s.name.clone(),
            })
            .collect(),
        rows,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
