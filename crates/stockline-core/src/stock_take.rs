//! # Stock Take Reconciliation
//!
//! Compares a physical count against the ledger and produces the adjustments
//! that bring the ledger in line.
//!
//! ```text
//! ledger (S1, B) = 50      counted = 45
//!          │                    │
//!          └──── diff = 45 − 50 = −5 ────► adjust(S1, B, −5, stock_take)
//!
//! diff == 0 → evaluated, not reported, not posted
//! ```
//!
//! Running the same count twice yields an empty report the second time.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreResult, ValidationError};
use crate::policy::NegativeCountPolicy;
use crate::validation::{
    validate_actor, validate_not_empty, validate_signed_quantity, validate_unique, validate_uuid,
};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockCount {
    pub product_id: String,
    pub counted_quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockTakeRequest {
    pub store_id: String,
    #[serde(alias = "items")]
    pub counts: Vec<StockCount>,
    pub staff_id: String,
    pub notes: Option<String>,
}

impl StockTakeRequest {
    pub fn validate(&self) -> CoreResult<()> {
        validate_actor(&self.staff_id)?;
        validate_uuid("store_id", &self.store_id)?;
        validate_not_empty("items", &self.counts)?;
        validate_unique("product_id", self.counts.iter().map(|c| c.product_id.as_str()))?;
        for count in &self.counts {
            // Negative counts are left to the store's NegativeCountPolicy
            validate_signed_quantity("counted_quantity", count.counted_quantity)?;
        }
        Ok(())
    }
}

/// One non-zero difference between ledger and count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockAdjustment {
    pub product_id: String,
    pub system_quantity: i64,
    pub counted_quantity: i64,
    pub diff: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockTakeReport {
    pub stock_take_id: String,
    pub store_id: String,
    pub staff_id: String,
    #[ts(as = "String")]
    pub taken_at: DateTime<Utc>,
    pub adjustments: Vec<StockAdjustment>,
}

/// Diffs every count against the ledger.
///
/// `system` maps product id → current ledger quantity in the store; missing
/// products have never moved and count as 0.
pub fn reconcile(
    system: &HashMap<String, i64>,
    counts: &[StockCount],
    policy: NegativeCountPolicy,
) -> CoreResult<Vec<StockAdjustment>> {
    let mut adjustments = Vec::new();

    for count in counts {
        let counted_quantity = match (count.counted_quantity < 0, policy) {
            (false, _) => count.counted_quantity,
            (true, NegativeCountPolicy::ClampToZero) => 0,
            (true, NegativeCountPolicy::Reject) => {
                return Err(ValidationError::OutOfRange {
                    field: format!("counted_quantity for product {}", count.product_id),
                    min: 0,
                    max: i64::MAX,
                }
                .into());
            }
        };

        let system_quantity = system.get(&count.product_id).copied().unwrap_or(0);
        let diff = counted_quantity.checked_sub(system_quantity).ok_or_else(|| {
            ValidationError::OutOfRange {
                field: format!("counted_quantity for product {}", count.product_id),
                min: 0,
                max: crate::MAX_LINE_QUANTITY,
            }
        })?;
        if diff != 0 {
            adjustments.push(StockAdjustment {
                product_id: count.product_id.clone(),
                system_quantity,
                counted_quantity,
                diff,
            });
        }
    }

    Ok(adjustments)
}
