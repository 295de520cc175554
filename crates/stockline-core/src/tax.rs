//! # Line Pricing
//!
//! Derives net / tax / total for an order line from its tax type and the
//! document's pricing mode.
//!
//! ## Two Conventions, One Explicit Switch
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PricingMode::Exclusive             PricingMode::Inclusive              │
//! │  ──────────────────────             ──────────────────────              │
//! │  net   = qty × unit_price           total = qty × unit_price            │
//! │  tax   = net × rate                 net   = total / (1 + rate)          │
//! │  total = net + tax                  tax   = total − net                 │
//! │                                                                         │
//! │  Both guarantee: total == net + tax                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The mode is stored on every purchase order, sales order and invoice, so a
//! document is always re-priced the way it was created.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::TaxRate;
use crate::validation::ValidationResult;

/// How tax applies to a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TaxType {
    /// Standard 16% VAT.
    Vat16,
    /// Taxable at 0%.
    ZeroRated,
    /// Outside the VAT net.
    Exempted,
}

impl TaxType {
    /// Rate applied for this tax type.
    pub const fn rate(&self) -> TaxRate {
        match self {
            TaxType::Vat16 => TaxRate::VAT_STANDARD,
            TaxType::ZeroRated | TaxType::Exempted => TaxRate::zero(),
        }
    }
}

impl Default for TaxType {
    fn default() -> Self {
        TaxType::Vat16
    }
}

/// Whether unit prices on a document include VAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PricingMode {
    /// Unit price excludes tax; tax is added on top.
    Exclusive,
    /// Unit price already includes tax; tax is extracted.
    Inclusive,
}

impl Default for PricingMode {
    fn default() -> Self {
        PricingMode::Exclusive
    }
}

/// A requested order line (purchase or sales).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineInput {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    #[serde(default)]
    pub tax_type: TaxType,
}

/// Derived money fields of one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LinePricing {
    pub net_price_cents: i64,
    pub tax_amount_cents: i64,
    pub total_price_cents: i64,
}

/// Header totals of a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTotals {
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

fn overflow(field: &str) -> ValidationError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: i64::MAX,
    }
}

/// Prices a single line.
///
/// Amounts that do not fit in `i64` cents are rejected as out of range.
///
/// ## Example
/// ```rust
/// use stockline_core::tax::{price_line, PricingMode, TaxType};
///
/// let exclusive = price_line(2, 5000, TaxType::Vat16, PricingMode::Exclusive).unwrap();
/// assert_eq!(exclusive.total_price_cents, 11600);
///
/// let inclusive = price_line(2, 5800, TaxType::Vat16, PricingMode::Inclusive).unwrap();
/// assert_eq!(inclusive.net_price_cents, 10000);
///
/// assert!(price_line(1000, i64::MAX / 10, TaxType::Vat16, PricingMode::Exclusive).is_err());
/// ```
pub fn price_line(
    quantity: i64,
    unit_price_cents: i64,
    tax_type: TaxType,
    mode: PricingMode,
) -> ValidationResult<LinePricing> {
    let gross = Money::from_cents(unit_price_cents)
        .checked_multiply_quantity(quantity)
        .ok_or_else(|| overflow("total_price"))?;
    let rate = tax_type.rate();

    let (net, tax) = match mode {
        PricingMode::Exclusive => (gross, gross.calculate_tax(rate)),
        PricingMode::Inclusive => {
            let net = gross.net_of_inclusive_tax(rate);
            (net, gross - net)
        }
    };
    let total = net.checked_add(tax).ok_or_else(|| overflow("total_price"))?;

    Ok(LinePricing {
        net_price_cents: net.cents(),
        tax_amount_cents: tax.cents(),
        total_price_cents: total.cents(),
    })
}

/// Sums line pricing into header totals.
pub fn document_totals<'a>(
    lines: impl IntoIterator<Item = &'a LinePricing>,
) -> ValidationResult<DocumentTotals> {
    lines
        .into_iter()
        .try_fold(DocumentTotals::default(), |acc, line| {
            Ok(DocumentTotals {
                subtotal_cents: acc
                    .subtotal_cents
                    .checked_add(line.net_price_cents)
                    .ok_or_else(|| overflow("subtotal"))?,
                tax_cents: acc
                    .tax_cents
                    .checked_add(line.tax_amount_cents)
                    .ok_or_else(|| overflow("tax"))?,
                total_cents: acc
                    .total_cents
                    .checked_add(line.total_price_cents)
                    .ok_or_else(|| overflow("total"))?,
            })
        })
}

// =============================================================================
// Unit Tests
// =============================================================================
