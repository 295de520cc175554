//! Opening balances: one-time seeding of a (store, product) line.
//!
//! A pair can be seeded once. A batch naming any pair that already has an
//! opening balance, or naming the same pair twice, is rejected whole and the
//! caller gets back every conflicting pair.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::ledger::StockKey;
use crate::validation::{validate_actor, validate_non_negative_quantity, validate_not_empty};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OpeningBalanceInput {
    pub store_id: String,
    pub product_id: String,
    pub opening_quantity: i64,
}

impl OpeningBalanceInput {
    pub fn key(&self) -> StockKey {
        StockKey::new(&self.store_id, &self.product_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OpeningBalance {
    pub store_id: String,
    pub product_id: String,
    pub opening_quantity: i64,
    pub recorded_by: String,
    #[ts(as = "String")]
    pub recorded_at: DateTime<Utc>,
}

/// Validates a batch against the pairs that already carry an opening
/// balance. The conflicting set is sorted and free of repeats.
pub fn check_batch(
    items: &[OpeningBalanceInput],
    existing: &HashSet<StockKey>,
    actor_id: &str,
) -> CoreResult<()> {
    validate_actor(actor_id)?;
    validate_not_empty("items", items)?;
    for item in items {
        validate_non_negative_quantity("opening_quantity", item.opening_quantity)?;
    }

    let mut seen = HashSet::new();
    let mut duplicates: Vec<StockKey> = items
        .iter()
        .map(OpeningBalanceInput::key)
        .filter(|key| {
            let repeated = !seen.insert(key.clone());
            repeated || existing.contains(key)
        })
        .collect();
    duplicates.sort();
    duplicates.dedup();

    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(CoreError::DuplicateOpeningBalance { duplicates })
    }
}
