//! # Sales Order Lifecycle
//!
//! Two status fields move side by side on every sales order.
//!
//! ## Dual Status
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  status (accounting)                                                    │
//! │  draft ─► confirmed ─► shipped ─► delivered ─► in_payment ─► paid       │
//! │    │          │           │                                             │
//! │    └──────────┴───────────┴──► cancelled                                │
//! │                                                                         │
//! │  my_status (fulfillment)                                                │
//! │  0 New ─approve─► 1 Approved ─dispatch─► 2 In Transit ─► 3 Complete     │
//! │    │                  │                      │                          │
//! │    decline            └───────── cancel ─────┴──► 4 Cancelled           │
//! │    ▼                                                                    │
//! │  5 Declined                                                             │
//! │                                                                         │
//! │  Rider assignment: only at my_status = 1                                │
//! │  Stock leaves the ledger when a delivery note is marked delivered,      │
//! │  never at invoicing.                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::policy::PartialDeliveryPolicy;
use crate::tax::{OrderLineInput, PricingMode, TaxType};
use crate::validation::{validate_actor, validate_uuid};

// =============================================================================
// Status
// =============================================================================

/// Accounting status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SalesOrderStatus {
    Draft,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
    InPayment,
    Paid,
}

impl SalesOrderStatus {
    /// Statuses from which an invoice may be raised.
    pub fn is_invoiceable(&self) -> bool {
        use SalesOrderStatus::*;
        matches!(self, Draft | Confirmed | Shipped | Delivered)
    }

    /// Once invoiced the order belongs to accounting and can no longer be
    /// cancelled.
    pub fn is_billed(&self) -> bool {
        matches!(self, SalesOrderStatus::InPayment | SalesOrderStatus::Paid)
    }
}

/// Fulfillment progress code (`my_status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[serde(into = "i32", try_from = "i32")]
#[repr(i32)]
pub enum FulfillmentStatus {
    New = 0,
    Approved = 1,
    InTransit = 2,
    Complete = 3,
    Cancelled = 4,
    Declined = 5,
}

impl FulfillmentStatus {
    pub fn code(&self) -> i32 {
        *self as i32
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, FulfillmentStatus::Cancelled | FulfillmentStatus::Declined)
    }
}

impl From<FulfillmentStatus> for i32 {
    fn from(status: FulfillmentStatus) -> i32 {
        status.code()
    }
}

impl TryFrom<i32> for FulfillmentStatus {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        use FulfillmentStatus::*;
        match code {
            0 => Ok(New),
            1 => Ok(Approved),
            2 => Ok(InTransit),
            3 => Ok(Complete),
            4 => Ok(Cancelled),
            5 => Ok(Declined),
            other => Err(format!("unknown fulfillment status code {other}")),
        }
    }
}

// =============================================================================
// Records
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SalesOrder {
    pub id: String,
    pub order_number: String,
    pub customer_id: String,
    /// Store the order ships from.
    pub store_id: String,
    #[ts(as = "String")]
    pub order_date: NaiveDate,
    pub status: SalesOrderStatus,
    #[ts(type = "number")]
    pub my_status: FulfillmentStatus,
    pub pricing_mode: PricingMode,
    pub rider_id: Option<String>,
    /// Set once `receive_back_to_stock` has restored shipped stock.
    pub stock_reversed: bool,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub notes: Option<String>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SalesOrderItem {
    pub id: String,
    pub sales_order_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub tax_type: TaxType,
    pub net_price_cents: i64,
    pub tax_amount_cents: i64,
    pub total_price_cents: i64,
    pub shipped_quantity: i64,
}

impl SalesOrderItem {
    #[inline]
    pub fn unshipped(&self) -> i64 {
        self.quantity - self.shipped_quantity
    }

    #[inline]
    pub fn is_fully_shipped(&self) -> bool {
        self.shipped_quantity == self.quantity
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SalesOrderDetail {
    pub order: SalesOrder,
    pub items: Vec<SalesOrderItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewSalesOrder {
    pub customer_id: String,
    pub store_id: String,
    #[ts(as = "String")]
    pub order_date: NaiveDate,
    /// Falls back to the configured sales pricing mode.
    pub pricing_mode: Option<PricingMode>,
    pub lines: Vec<OrderLineInput>,
    pub notes: Option<String>,
    pub actor_id: String,
}

impl NewSalesOrder {
    pub fn validate(&self) -> CoreResult<()> {
        validate_actor(&self.actor_id)?;
        validate_uuid("store_id", &self.store_id)?;
        crate::validation::validate_order_lines(&self.lines)?;
        Ok(())
    }
}

/// One item's stock restored by `receive_back_to_stock`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReversalLine {
    pub sales_order_item_id: String,
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReversalOutcome {
    pub sales_order_id: String,
    pub store_id: String,
    /// Empty when stock had already been reversed.
    pub restored: Vec<ReversalLine>,
}

// =============================================================================
// Rules
// =============================================================================

fn fulfillment_error(order: &SalesOrder, to: FulfillmentStatus) -> CoreError {
    CoreError::transition("SalesOrder", &order.id, order.my_status, to)
}

/// New → Approved, draft → confirmed.
pub fn approve(order: &SalesOrder) -> CoreResult<(FulfillmentStatus, SalesOrderStatus)> {
    if order.my_status != FulfillmentStatus::New || order.status != SalesOrderStatus::Draft {
        return Err(fulfillment_error(order, FulfillmentStatus::Approved));
    }
    Ok((FulfillmentStatus::Approved, SalesOrderStatus::Confirmed))
}

/// New → Declined, status → cancelled.
pub fn decline(order: &SalesOrder) -> CoreResult<(FulfillmentStatus, SalesOrderStatus)> {
    if order.my_status != FulfillmentStatus::New {
        return Err(fulfillment_error(order, FulfillmentStatus::Declined));
    }
    Ok((FulfillmentStatus::Declined, SalesOrderStatus::Cancelled))
}

/// Rider assignment is legal only while the order is Approved.
pub fn ensure_rider_assignable(order: &SalesOrder) -> CoreResult<()> {
    if order.my_status != FulfillmentStatus::Approved {
        return Err(CoreError::InvalidStateTransition {
            entity: "SalesOrder".to_string(),
            id: order.id.clone(),
            from: format!("{:?}", order.my_status),
            to: "RiderAssigned".to_string(),
        });
    }
    Ok(())
}

/// Approved → In Transit; a rider must be assigned first.
pub fn dispatch(order: &SalesOrder) -> CoreResult<FulfillmentStatus> {
    if order.my_status != FulfillmentStatus::Approved {
        return Err(fulfillment_error(order, FulfillmentStatus::InTransit));
    }
    if order.rider_id.is_none() {
        return Err(ValidationError::Required {
            field: "rider_id".to_string(),
        }
        .into());
    }
    Ok(FulfillmentStatus::InTransit)
}

/// Any live, unbilled order may be cancelled, including one whose stock has
/// already shipped (that stock comes back through `plan_reversal`).
pub fn cancel(order: &SalesOrder) -> CoreResult<(FulfillmentStatus, SalesOrderStatus)> {
    if order.my_status.is_terminated() || order.status.is_billed() {
        return Err(fulfillment_error(order, FulfillmentStatus::Cancelled));
    }
    Ok((FulfillmentStatus::Cancelled, SalesOrderStatus::Cancelled))
}

/// Completes an order with unshipped quantity. Allowed only under
/// `PartialDeliveryPolicy::ExplicitClose`, while the order is Approved or In
/// Transit and no delivery note is open.
pub fn close_short(
    order: &SalesOrder,
    open_delivery_notes: usize,
    policy: PartialDeliveryPolicy,
) -> CoreResult<(FulfillmentStatus, SalesOrderStatus)> {
    if policy != PartialDeliveryPolicy::ExplicitClose {
        return Err(CoreError::PartialCloseNotAllowed {
            order_id: order.id.clone(),
        });
    }
    if !matches!(
        order.my_status,
        FulfillmentStatus::Approved | FulfillmentStatus::InTransit
    ) || open_delivery_notes > 0
    {
        return Err(fulfillment_error(order, FulfillmentStatus::Complete));
    }
    Ok((FulfillmentStatus::Complete, status_on_completion(order.status)))
}

fn status_on_completion(current: SalesOrderStatus) -> SalesOrderStatus {
    match current {
        SalesOrderStatus::Confirmed | SalesOrderStatus::Shipped => SalesOrderStatus::Delivered,
        other => other,
    }
}

/// Status pair after a delivery note is marked delivered.
///
/// my_status reaches Complete only when every item is fully shipped; the
/// coarse status follows (`shipped` for partial, `delivered` for full) while
/// the order is still in its shipping phase.
pub fn progress_after_delivery(
    order: &SalesOrder,
    items: &[SalesOrderItem],
) -> (FulfillmentStatus, SalesOrderStatus) {
    let all_shipped = !items.is_empty() && items.iter().all(SalesOrderItem::is_fully_shipped);

    let my_status = if all_shipped {
        FulfillmentStatus::Complete
    } else if order.my_status == FulfillmentStatus::Approved {
        FulfillmentStatus::InTransit
    } else {
        order.my_status
    };

    let status = match order.status {
        SalesOrderStatus::Confirmed | SalesOrderStatus::Shipped if all_shipped => {
            SalesOrderStatus::Delivered
        }
        SalesOrderStatus::Confirmed => SalesOrderStatus::Shipped,
        other => other,
    };

    (my_status, status)
}

/// Invoicing is allowed from draft/confirmed/shipped/delivered, on a live
/// order with no delivery note still open.
pub fn ensure_invoiceable(order: &SalesOrder, open_delivery_notes: usize) -> CoreResult<()> {
    if !order.status.is_invoiceable() || order.my_status.is_terminated() || open_delivery_notes > 0
    {
        return Err(CoreError::transition(
            "SalesOrder",
            &order.id,
            order.status,
            SalesOrderStatus::InPayment,
        ));
    }
    Ok(())
}

/// Lines to restore after a cancellation: exactly what shipped, per item.
///
/// Returns an empty plan when the order was already reversed, so a second
/// call is a no-op.
pub fn plan_reversal(order: &SalesOrder, items: &[SalesOrderItem]) -> CoreResult<Vec<ReversalLine>> {
    if order.my_status != FulfillmentStatus::Cancelled {
        return Err(CoreError::InvalidStateTransition {
            entity: "SalesOrder".to_string(),
            id: order.id.clone(),
            from: format!("{:?}", order.my_status),
            to: "StockReversed".to_string(),
        });
    }
    if order.stock_reversed {
        return Ok(Vec::new());
    }

    Ok(items
        .iter()
        .filter(|i| i.shipped_quantity > 0)
        .map(|i| ReversalLine {
            sales_order_item_id: i.id.clone(),
            product_id: i.product_id.clone(),
            quantity: i.shipped_quantity,
        })
        .collect())
}

// =============================================================================
// Unit Tests
// =============================================================================
