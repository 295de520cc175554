//! # HTTP Handlers
//!
//! One module per document family. Bodies and responses are camelCase JSON.
//!
//! - [`health`] - Liveness
//! - [`master`] - Products, stores, customers, suppliers, riders
//! - [`inventory`] - Ledger primitives, opening balances, summary
//! - [`purchase`] - Purchase orders and receiving
//! - [`sales`] - Sales order lifecycle, rider assignment, stock reversal
//! - [`delivery`] - Delivery notes and shipment
//! - [`invoice`] - Invoices and payments
//! - [`credit`] - Credit notes
//! - [`stock_take`] - Physical counts

pub mod credit;
pub mod delivery;
pub mod health;
pub mod inventory;
pub mod invoice;
pub mod master;
pub mod purchase;
pub mod sales;
pub mod stock_take;

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};

/// Body of status-only actions (`approve`, `send`, `cancel`, ...).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorBody {
    pub actor_id: String,
}

/// `{ "success": true }`
#[derive(Debug, Serialize)]
pub struct Ack {
    pub success: bool,
}

impl Ack {
    pub fn ok() -> Self {
        Ack { success: true }
    }
}

/// `{ "success": true, ...payload }`
#[derive(Debug, Serialize)]
pub struct Success<T> {
    pub success: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T> Success<T> {
    pub fn new(data: T) -> Self {
        Success { success: true, data }
    }
}

/// Maps a missing row to 404.
pub(crate) fn found<T>(value: Option<T>, resource: &str, id: &str) -> ApiResult<T> {
    value.ok_or_else(|| ApiError::not_found(resource, id))
}
