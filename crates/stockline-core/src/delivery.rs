//! # Delivery Notes
//!
//! A delivery note ships part or all of a sales order. Marking it delivered is
//! the single point where stock leaves the ledger.
//!
//! ## Progress
//! ```text
//! 0 Draft ──prepare──► 1 Prepared ──dispatch──► 2 In Transit ──► 3 Delivered
//!    │                     │  (rider assigned here)   │
//!    └─────────────────────┴──────── cancel ──────────┴──► 4 Cancelled
//!
//! mark_delivered is accepted from 0, 1 or 2.
//! ```
//!
//! ## Quantity Bound
//! For every sales order item:
//! `planned on open notes + shipped <= ordered`, so the sum of delivered
//! quantities across notes can never exceed the order item.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::sales::{FulfillmentStatus, SalesOrder, SalesOrderItem};
use crate::validation::{validate_actor, validate_not_empty, validate_quantity, validate_unique};

// =============================================================================
// Status
// =============================================================================

/// Coarse delivery note status, kept in step with `my_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryNoteStatus {
    Open,
    Delivered,
    Cancelled,
}

/// Delivery progress code (`my_status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[serde(into = "i32", try_from = "i32")]
#[repr(i32)]
pub enum DeliveryProgress {
    Draft = 0,
    Prepared = 1,
    InTransit = 2,
    Delivered = 3,
    Cancelled = 4,
}

impl DeliveryProgress {
    /// Open notes still hold planned quantity against the order.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            DeliveryProgress::Draft | DeliveryProgress::Prepared | DeliveryProgress::InTransit
        )
    }

    pub fn coarse(&self) -> DeliveryNoteStatus {
        match self {
            DeliveryProgress::Delivered => DeliveryNoteStatus::Delivered,
            DeliveryProgress::Cancelled => DeliveryNoteStatus::Cancelled,
            _ => DeliveryNoteStatus::Open,
        }
    }
}

impl From<DeliveryProgress> for i32 {
    fn from(progress: DeliveryProgress) -> i32 {
        progress as i32
    }
}

impl TryFrom<i32> for DeliveryProgress {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        use DeliveryProgress::*;
        match code {
            0 => Ok(Draft),
            1 => Ok(Prepared),
            2 => Ok(InTransit),
            3 => Ok(Delivered),
            4 => Ok(Cancelled),
            other => Err(format!("unknown delivery progress code {other}")),
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
pub struct DeliveryNote {
    pub id: String,
    pub note_number: String,
    pub sales_order_id: String,
    pub customer_id: String,
    #[ts(as = "String")]
    pub delivery_date: NaiveDate,
    pub status: DeliveryNoteStatus,
    #[ts(type = "number")]
    pub my_status: DeliveryProgress,
    pub rider_id: Option<String>,
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
pub struct DeliveryNoteItem {
    pub id: String,
    pub delivery_note_id: String,
    pub sales_order_item_id: String,
    pub product_id: String,
    /// Planned quantity.
    pub quantity: i64,
    pub delivered_quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryNoteDetail {
    pub note: DeliveryNote,
    pub items: Vec<DeliveryNoteItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryLineInput {
    pub sales_order_item_id: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewDeliveryNote {
    pub sales_order_id: String,
    #[ts(as = "String")]
    pub delivery_date: NaiveDate,
    pub lines: Vec<DeliveryLineInput>,
    pub notes: Option<String>,
    pub actor_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDeliveryLine {
    pub sales_order_item_id: String,
    pub product_id: String,
    pub quantity: i64,
}

// =============================================================================
// Rules
// =============================================================================

fn progress_error(note: &DeliveryNote, to: DeliveryProgress) -> CoreError {
    CoreError::transition("DeliveryNote", &note.id, note.my_status, to)
}

/// Validates a new delivery note against the order's unshipped, unplanned
/// quantity.
///
/// `planned_on_open` maps sales order item id → quantity already planned on
/// other open notes.
pub fn plan_delivery_note(
    order: &SalesOrder,
    items: &[SalesOrderItem],
    planned_on_open: &HashMap<String, i64>,
    request: &NewDeliveryNote,
) -> CoreResult<Vec<PlannedDeliveryLine>> {
    if !matches!(
        order.my_status,
        FulfillmentStatus::Approved | FulfillmentStatus::InTransit | FulfillmentStatus::Complete
    ) {
        return Err(CoreError::InvalidStateTransition {
            entity: "SalesOrder".to_string(),
            id: order.id.clone(),
            from: format!("{:?}", order.my_status),
            to: "DeliveryNoteCreated".to_string(),
        });
    }

    validate_actor(&request.actor_id)?;
    validate_not_empty("lines", &request.lines)?;
    validate_unique(
        "sales_order_item_id",
        request.lines.iter().map(|l| l.sales_order_item_id.as_str()),
    )?;

    let by_id: HashMap<&str, &SalesOrderItem> = items.iter().map(|i| (i.id.as_str(), i)).collect();

    request
        .lines
        .iter()
        .map(|line| {
            validate_quantity("quantity", line.quantity)?;
            let item = by_id
                .get(line.sales_order_item_id.as_str())
                .ok_or_else(|| CoreError::not_found("SalesOrderItem", &line.sales_order_item_id))?;

            let planned = planned_on_open
                .get(&item.id)
                .copied()
                .unwrap_or(0);
            let remaining = if order.my_status == FulfillmentStatus::Complete {
                0
            } else {
                (item.unshipped() - planned).max(0)
            };

            if line.quantity > remaining {
                return Err(CoreError::QuantityExceeded {
                    entity: "SalesOrderItem".to_string(),
                    item_id: item.id.clone(),
                    requested: line.quantity,
                    remaining,
                });
            }

            Ok(PlannedDeliveryLine {
                sales_order_item_id: item.id.clone(),
                product_id: item.product_id.clone(),
                quantity: line.quantity,
            })
        })
        .collect()
}

/// Draft → Prepared.
pub fn prepare(note: &DeliveryNote) -> CoreResult<DeliveryProgress> {
    if note.my_status != DeliveryProgress::Draft {
        return Err(progress_error(note, DeliveryProgress::Prepared));
    }
    Ok(DeliveryProgress::Prepared)
}

/// Riders are assigned to a note while it is Prepared.
pub fn ensure_rider_assignable(note: &DeliveryNote) -> CoreResult<()> {
    if note.my_status != DeliveryProgress::Prepared {
        return Err(CoreError::InvalidStateTransition {
            entity: "DeliveryNote".to_string(),
            id: note.id.clone(),
            from: format!("{:?}", note.my_status),
            to: "RiderAssigned".to_string(),
        });
    }
    Ok(())
}

/// Prepared → In Transit; requires a rider.
pub fn dispatch(note: &DeliveryNote) -> CoreResult<DeliveryProgress> {
    if note.my_status != DeliveryProgress::Prepared {
        return Err(progress_error(note, DeliveryProgress::InTransit));
    }
    if note.rider_id.is_none() {
        return Err(crate::error::ValidationError::Required {
            field: "rider_id".to_string(),
        }
        .into());
    }
    Ok(DeliveryProgress::InTransit)
}

/// Any open note may be cancelled; its planned quantity is released.
pub fn cancel(note: &DeliveryNote) -> CoreResult<DeliveryProgress> {
    if !note.my_status.is_open() {
        return Err(progress_error(note, DeliveryProgress::Cancelled));
    }
    Ok(DeliveryProgress::Cancelled)
}

/// An open note on a live order may be marked delivered.
///
/// Draft and Prepared notes qualify too: a note handed over at the counter
/// never travels, so it has no rider and skips `dispatch`. A rider gates the
/// In Transit step only, and a note that is In Transit already has one.
pub fn ensure_deliverable(note: &DeliveryNote, order: &SalesOrder) -> CoreResult<()> {
    if !note.my_status.is_open() {
        return Err(progress_error(note, DeliveryProgress::Delivered));
    }
    if order.my_status.is_terminated() {
        return Err(CoreError::transition(
            "SalesOrder",
            &order.id,
            order.my_status,
            FulfillmentStatus::Complete,
        ));
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
