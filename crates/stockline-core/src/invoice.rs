//! # Invoices & Payments
//!
//! An invoice is raised once per sales order and copies the order's item
//! pricing. Invoicing never touches the ledger: stock moved when delivery
//! notes were marked delivered.
//!
//! ```text
//! convert_to_invoice:  sales order ──► invoice (unpaid), order → in_payment
//! record_payment:      unpaid ──► partially_paid ──► paid, order → paid
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::sales::SalesOrderItem;
use crate::tax::{PricingMode, TaxType};
use crate::validation::validate_payment_amount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Unpaid,
    PartiallyPaid,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub invoice_number: String,
    pub sales_order_id: String,
    pub customer_id: String,
    #[ts(as = "String")]
    pub invoice_date: NaiveDate,
    pub pricing_mode: PricingMode,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub amount_paid_cents: i64,
    pub status: InvoiceStatus,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    #[inline]
    pub fn outstanding_cents(&self) -> i64 {
        self.total_cents - self.amount_paid_cents
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItem {
    pub id: String,
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
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub invoice_id: String,
    pub amount_cents: i64,
    pub reference: Option<String>,
    pub recorded_by: String,
    #[ts(as = "String")]
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDetail {
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
    pub payments: Vec<Payment>,
}

/// Line data copied from a sales order item onto its invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub tax_type: TaxType,
    pub net_price_cents: i64,
    pub tax_amount_cents: i64,
    pub total_price_cents: i64,
}

impl From<&SalesOrderItem> for InvoiceLine {
    fn from(item: &SalesOrderItem) -> Self {
        InvoiceLine {
            product_id: item.product_id.clone(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price_cents,
            tax_type: item.tax_type,
            net_price_cents: item.net_price_cents,
            tax_amount_cents: item.tax_amount_cents,
            total_price_cents: item.total_price_cents,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentRequest {
    pub amount_cents: i64,
    pub reference: Option<String>,
    pub actor_id: String,
}

/// Validates a payment and returns the invoice status it leads to.
///
/// Overpayment is rejected rather than carried as customer credit.
pub fn apply_payment(invoice: &Invoice, amount_cents: i64) -> CoreResult<InvoiceStatus> {
    if invoice.status == InvoiceStatus::Paid {
        return Err(CoreError::transition(
            "Invoice",
            &invoice.id,
            invoice.status,
            InvoiceStatus::Paid,
        ));
    }
    validate_payment_amount(amount_cents)?;

    let outstanding = invoice.outstanding_cents();
    if amount_cents > outstanding {
        return Err(ValidationError::OutOfRange {
            field: "amount".to_string(),
            min: 1,
            max: outstanding,
        }
        .into());
    }

    Ok(if amount_cents == outstanding {
        InvoiceStatus::Paid
    } else {
        InvoiceStatus::PartiallyPaid
    })
}
