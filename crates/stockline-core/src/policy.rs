//! Business policies that vary per deployment.
//!
//! Each one is loaded from configuration and passed explicitly to the rules
//! that depend on it; nothing here has a hidden default at the call site.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::tax::PricingMode;

/// Whether a sales order may be closed with items still unshipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PartialDeliveryPolicy {
    /// An order completes only when every item is fully shipped.
    #[default]
    Strict,
    /// `close_short` may complete an order that shipped less than ordered.
    ExplicitClose,
}

/// What a stock take does with a negative counted quantity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum NegativeCountPolicy {
    /// Reject the whole stock take.
    #[default]
    Reject,
    /// Treat the count as zero.
    ClampToZero,
}

/// The full policy set handed to the persistence layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default, rename_all = "snake_case")]
pub struct LedgerPolicy {
    pub partial_delivery: PartialDeliveryPolicy,
    pub negative_count: NegativeCountPolicy,
    /// Pricing mode for purchase orders that do not name one.
    pub purchase_pricing: PricingMode,
    /// Pricing mode for sales orders that do not name one.
    pub sales_pricing: PricingMode,
}
