//! # Purchase Order Lifecycle
//!
//! How ordered quantity becomes received stock.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   ┌───────┐  send   ┌──────┐  receive(final)  ┌──────────┐             │
//! │   │ draft │ ──────► │ sent │ ───────────────► │ received │             │
//! │   └───┬───┘         └──┬───┘                  └──────────┘             │
//! │       │                │  ▲                                             │
//! │       │                │  │ receive(partial)                            │
//! │       │                └──┘                                             │
//! │       │ cancel         │ cancel                                         │
//! │       ▼                ▼                                                │
//! │   ┌───────────────────────┐                                             │
//! │   │       cancelled       │                                             │
//! │   └───────────────────────┘                                             │
//! │                                                                         │
//! │  Items are editable only in draft.                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Receiving
//! `plan_receipt` validates a receive call against a consistent read of the
//! order. The persistence layer then applies each planned line with a
//! conditional increment (`received_quantity + q <= quantity`), so a plan
//! computed from a stale read can never over-receive.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::tax::{OrderLineInput, PricingMode, TaxType};
use crate::validation::{
    validate_actor, validate_not_empty, validate_price_cents, validate_unique,
};

// =============================================================================
// Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseOrderStatus {
    Draft,
    Sent,
    Received,
    Cancelled,
}

impl PurchaseOrderStatus {
    /// Whether the transition table allows `self → next`.
    pub fn can_transition_to(&self, next: PurchaseOrderStatus) -> bool {
        use PurchaseOrderStatus::*;
        matches!(
            (self, next),
            (Draft, Sent) | (Sent, Received) | (Draft, Cancelled) | (Sent, Cancelled)
        )
    }

    pub fn is_editable(&self) -> bool {
        matches!(self, PurchaseOrderStatus::Draft)
    }
}

// =============================================================================
// Records
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrder {
    pub id: String,
    pub order_number: String,
    pub supplier_id: String,
    #[ts(as = "String")]
    pub order_date: NaiveDate,
    pub status: PurchaseOrderStatus,
    pub pricing_mode: PricingMode,
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
pub struct PurchaseOrderItem {
    pub id: String,
    pub purchase_order_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub tax_type: TaxType,
    pub net_price_cents: i64,
    pub tax_amount_cents: i64,
    pub total_price_cents: i64,
    pub received_quantity: i64,
}

impl PurchaseOrderItem {
    #[inline]
    pub fn remaining(&self) -> i64 {
        self.quantity - self.received_quantity
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.received_quantity == self.quantity
    }
}

/// Immutable audit record of one receiving line.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InventoryReceipt {
    pub id: String,
    pub purchase_order_id: String,
    pub purchase_order_item_id: String,
    pub product_id: String,
    pub store_id: String,
    pub received_quantity: i64,
    pub unit_cost_cents: i64,
    pub notes: Option<String>,
    pub received_by: String,
    #[ts(as = "String")]
    pub received_at: DateTime<Utc>,
}

/// Header plus lines, as returned by reads.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrderDetail {
    pub order: PurchaseOrder,
    pub items: Vec<PurchaseOrderItem>,
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewPurchaseOrder {
    pub supplier_id: String,
    #[ts(as = "String")]
    pub order_date: NaiveDate,
    /// Falls back to the configured purchase pricing mode.
    pub pricing_mode: Option<PricingMode>,
    pub lines: Vec<OrderLineInput>,
    pub notes: Option<String>,
    pub actor_id: String,
}

impl NewPurchaseOrder {
    pub fn validate(&self) -> CoreResult<()> {
        validate_actor(&self.actor_id)?;
        crate::validation::validate_order_lines(&self.lines)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveLine {
    pub product_id: String,
    pub received_quantity: i64,
    /// Defaults to the PO item's unit price.
    pub unit_cost_cents: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveItemsRequest {
    #[serde(alias = "poId")]
    pub purchase_order_id: String,
    pub store_id: String,
    pub items: Vec<ReceiveLine>,
    pub notes: Option<String>,
    pub actor_id: String,
}

/// One validated receive line, bound to the PO item it increments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedReceipt {
    pub item_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_cost_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveOutcome {
    pub purchase_order_id: String,
    pub po_status: PurchaseOrderStatus,
    pub receipts: Vec<InventoryReceipt>,
}

// =============================================================================
// Rules
// =============================================================================

/// Checks a status change against the transition table.
pub fn ensure_transition(order: &PurchaseOrder, next: PurchaseOrderStatus) -> CoreResult<()> {
    if order.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(CoreError::transition("PurchaseOrder", &order.id, order.status, next))
    }
}

/// Item edits are allowed in draft only.
pub fn ensure_editable(order: &PurchaseOrder) -> CoreResult<()> {
    if order.status.is_editable() {
        Ok(())
    } else {
        Err(CoreError::transition(
            "PurchaseOrder",
            &order.id,
            order.status,
            PurchaseOrderStatus::Draft,
        ))
    }
}

/// Validates a receive call and binds each line to its PO item.
///
/// ## Rules
/// - The order must be `sent`
/// - Each product may appear once per call
/// - `0 < received_quantity <= quantity - received_quantity`, otherwise
///   `InvalidReceivingQuantity` (a product not on the order has 0 remaining)
pub fn plan_receipt(
    order: &PurchaseOrder,
    items: &[PurchaseOrderItem],
    request: &ReceiveItemsRequest,
) -> CoreResult<Vec<PlannedReceipt>> {
    if order.status != PurchaseOrderStatus::Sent {
        return Err(CoreError::transition(
            "PurchaseOrder",
            &order.id,
            order.status,
            PurchaseOrderStatus::Received,
        ));
    }

    validate_actor(&request.actor_id)?;
    validate_not_empty("items", &request.items)?;
    validate_unique(
        "product_id",
        request.items.iter().map(|l| l.product_id.as_str()),
    )?;

    let by_product: HashMap<&str, &PurchaseOrderItem> =
        items.iter().map(|i| (i.product_id.as_str(), i)).collect();

    request
        .items
        .iter()
        .map(|line| {
            let item = by_product.get(line.product_id.as_str());
            let remaining = item.map(|i| i.remaining()).unwrap_or(0);

            if line.received_quantity <= 0 || line.received_quantity > remaining {
                return Err(CoreError::InvalidReceivingQuantity {
                    purchase_order_id: order.id.clone(),
                    product_id: line.product_id.clone(),
                    requested: line.received_quantity,
                    remaining,
                });
            }

            // remaining > 0 implies the item exists
            let item = item.ok_or_else(|| CoreError::not_found("PurchaseOrderItem", &line.product_id))?;
            let unit_cost_cents = line.unit_cost_cents.unwrap_or(item.unit_price_cents);
            validate_price_cents("unit_cost", unit_cost_cents)?;

            Ok(PlannedReceipt {
                item_id: item.id.clone(),
                product_id: line.product_id.clone(),
                quantity: line.received_quantity,
                unit_cost_cents,
            })
        })
        .collect()
}

/// Status after a receipt commits: `received` once every item is complete.
pub fn status_after_receipt(items: &[PurchaseOrderItem]) -> PurchaseOrderStatus {
    if !items.is_empty() && items.iter().all(PurchaseOrderItem::is_complete) {
        PurchaseOrderStatus::Received
    } else {
        PurchaseOrderStatus::Sent
    }
}

/// Rejects a send on an order with no lines.
pub fn ensure_sendable(order: &PurchaseOrder, items: &[PurchaseOrderItem]) -> CoreResult<()> {
    ensure_transition(order, PurchaseOrderStatus::Sent)?;
    if items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        }
        .into());
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn order(status: PurchaseOrderStatus) -> PurchaseOrder {
        let now = Utc::now();
        PurchaseOrder {
            id: "po-1".to_string(),
            order_number: "PO-1".to_string(),
            supplier_id: "sup".to_string(),
            order_date: now.date_naive(),
            status,
            pricing_mode: PricingMode::Exclusive,
            subtotal_cents: 0,
            tax_cents: 0,
            total_cents: 0,
            notes: None,
            created_by: "u1".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn item(product: &str, quantity: i64, received: i64) -> PurchaseOrderItem {
        PurchaseOrderItem {
            id: format!("item-{product}"),
            purchase_order_id: "po-1".to_string(),
            product_id: product.to_string(),
            quantity,
            unit_price_cents: 1000,
            tax_type: TaxType::Vat16,
            net_price_cents: 0,
            tax_amount_cents: 0,
            total_price_cents: 0,
            received_quantity: received,
        }
    }

    fn receive(lines: &[(&str, i64)]) -> ReceiveItemsRequest {
        ReceiveItemsRequest {
            purchase_order_id: "po-1".to_string(),
            store_id: "s1".to_string(),
            items: lines
                .iter()
                .map(|(p, q)| ReceiveLine {
                    product_id: p.to_string(),
                    received_quantity: *q,
                    unit_cost_cents: None,
                })
                .collect(),
            notes: None,
            actor_id: "u1".to_string(),
        }
    }

    #[test]
    fn test_transition_table() {
        use PurchaseOrderStatus::*;
        assert!(Draft.can_transition_to(Sent));
        assert!(Sent.can_transition_to(Received));
        assert!(Draft.can_transition_to(Cancelled));
        assert!(Sent.can_transition_to(Cancelled));

        assert!(!Draft.can_transition_to(Received));
        assert!(!Received.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Sent));
    }

    #[test]
    fn test_receive_against_draft_is_invalid_transition() {
        let err = plan_receipt(
            &order(PurchaseOrderStatus::Draft),
            &[item("A", 100, 0)],
            &receive(&[("A", 10)]),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_receive_plan_binds_items_and_defaults_cost() {
        let plan = plan_receipt(
            &order(PurchaseOrderStatus::Sent),
            &[item("A", 100, 60)],
            &receive(&[("A", 40)]),
        )
        .unwrap();
        assert_eq!(
            plan,
            vec![PlannedReceipt {
                item_id: "item-A".to_string(),
                product_id: "A".to_string(),
                quantity: 40,
                unit_cost_cents: 1000,
            }]
        );
    }

    #[test]
    fn test_over_receive_reports_remaining() {
        let err = plan_receipt(
            &order(PurchaseOrderStatus::Sent),
            &[item("A", 100, 60)],
            &receive(&[("A", 41)]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidReceivingQuantity { requested: 41, remaining: 40, .. }
        ));
    }

    #[test]
    fn test_non_positive_and_unknown_products_rejected() {
        let po = order(PurchaseOrderStatus::Sent);
        let items = [item("A", 100, 0)];

        for bad in [0, -3] {
            assert!(matches!(
                plan_receipt(&po, &items, &receive(&[("A", bad)])),
                Err(CoreError::InvalidReceivingQuantity { .. })
            ));
        }

        assert!(matches!(
            plan_receipt(&po, &items, &receive(&[("Z", 1)])),
            Err(CoreError::InvalidReceivingQuantity { remaining: 0, .. })
        ));
    }

    #[test]
    fn test_duplicate_product_in_one_call_rejected() {
        let err = plan_receipt(
            &order(PurchaseOrderStatus::Sent),
            &[item("A", 100, 0)],
            &receive(&[("A", 10), ("A", 10)]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::Duplicate { .. })
        ));
    }

    #[test]
    fn test_status_after_receipt_boundary() {
        assert_eq!(
            status_after_receipt(&[item("A", 100, 100), item("B", 5, 5)]),
            PurchaseOrderStatus::Received
        );
        assert_eq!(
            status_after_receipt(&[item("A", 100, 99), item("B", 5, 5)]),
            PurchaseOrderStatus::Sent
        );
    }

    #[test]
    fn test_send_requires_lines() {
        assert!(ensure_sendable(&order(PurchaseOrderStatus::Draft), &[]).is_err());
        assert!(ensure_sendable(&order(PurchaseOrderStatus::Draft), &[item("A", 1, 0)]).is_ok());
        assert!(ensure_sendable(&order(PurchaseOrderStatus::Sent), &[item("A", 1, 0)]).is_err());
    }
}
