//! Credit notes against issued invoices.
//!
//! Credit notes are financial only: they never move stock. Returned goods
//! come back through a manual correction or a stock take.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::invoice::{Invoice, InvoiceItem};
use crate::tax::{price_line, LinePricing, TaxType};
use crate::validation::{
    validate_actor, validate_not_empty, validate_price_cents, validate_quantity, validate_unique,
};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CreditNote {
    pub id: String,
    pub credit_note_number: String,
    pub customer_id: String,
    pub original_invoice_id: String,
    #[ts(as = "String")]
    pub credit_date: NaiveDate,
    pub reason: String,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CreditNoteItem {
    pub id: String,
    pub credit_note_id: String,
    pub invoice_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub tax_type: TaxType,
    pub net_price_cents: i64,
    pub tax_amount_cents: i64,
    pub total_price_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CreditNoteDetail {
    pub credit_note: CreditNote,
    pub items: Vec<CreditNoteItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CreditLineInput {
    pub invoice_id: String,
    pub product_id: String,
    pub quantity: i64,
    /// Defaults to the invoiced unit price.
    pub unit_price_cents: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewCreditNote {
    pub customer_id: String,
    pub original_invoice_id: String,
    #[ts(as = "String")]
    pub credit_date: NaiveDate,
    pub reason: String,
    pub items: Vec<CreditLineInput>,
    pub actor_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCreditLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub tax_type: TaxType,
    pub pricing: LinePricing,
}

/// Validates a credit note against its invoice.
///
/// `already_credited` maps product id → quantity credited by earlier notes
/// on the same invoice.
pub fn plan_credit_note(
    invoice: &Invoice,
    invoice_items: &[InvoiceItem],
    already_credited: &HashMap<String, i64>,
    request: &NewCreditNote,
) -> CoreResult<Vec<PlannedCreditLine>> {
    validate_actor(&request.actor_id)?;
    if request.reason.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "reason".to_string(),
        }
        .into());
    }
    if invoice.customer_id != request.customer_id {
        return Err(ValidationError::UnknownReference {
            field: "original_invoice_id".to_string(),
            value: invoice.id.clone(),
        }
        .into());
    }
    validate_not_empty("items", &request.items)?;
    validate_unique("product_id", request.items.iter().map(|l| l.product_id.as_str()))?;

    let invoiced: HashMap<&str, &InvoiceItem> = invoice_items
        .iter()
        .map(|i| (i.product_id.as_str(), i))
        .collect();

    request
        .items
        .iter()
        .map(|line| {
            if line.invoice_id != invoice.id {
                return Err(ValidationError::UnknownReference {
                    field: "invoice_id".to_string(),
                    value: line.invoice_id.clone(),
                }
                .into());
            }
            validate_quantity("quantity", line.quantity)?;

            let item = invoiced.get(line.product_id.as_str()).ok_or_else(|| {
                CoreError::from(ValidationError::UnknownReference {
                    field: "product_id".to_string(),
                    value: line.product_id.clone(),
                })
            })?;

            let credited = already_credited.get(&line.product_id).copied().unwrap_or(0);
            let remaining = item.quantity - credited;
            if line.quantity > remaining {
                return Err(CoreError::QuantityExceeded {
                    entity: "InvoiceItem".to_string(),
                    item_id: item.id.clone(),
                    requested: line.quantity,
                    remaining,
                });
            }

            let unit_price_cents = line.unit_price_cents.unwrap_or(item.unit_price_cents);
            validate_price_cents("unit_price", unit_price_cents)?;

            Ok(PlannedCreditLine {
                product_id: line.product_id.clone(),
                quantity: line.quantity,
                unit_price_cents,
                tax_type: item.tax_type,
                pricing: price_line(line.quantity, unit_price_cents, item.tax_type, invoice.pricing_mode)?,
            })
        })
        .collect()
}
