//! # Money
//!
//! Integer cents for every document amount. Line pricing goes through this
//! type so VAT is computed the same way on orders, invoices and credit notes.
//!
//! ```text
//! exclusive   tax = round_half_up(net × bps / 10000)
//! inclusive   net = round_half_up(total × 10000 / (10000 + bps))
//!             tax = total − net
//! ```
//!
//! In both modes `net + tax == total` holds exactly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use ts_rs::TS;

use crate::types::TaxRate;

/// An amount in cents. Signed: reversals and credits may be negative.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Extends a unit price over a line quantity. `None` on overflow.
    #[inline]
    pub const fn checked_multiply_quantity(&self, quantity: i64) -> Option<Self> {
        match self.0.checked_mul(quantity) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    #[inline]
    pub const fn checked_add(&self, rhs: Money) -> Option<Self> {
        match self.0.checked_add(rhs.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// VAT charged on top of this net amount.
    ///
    /// ```rust
    /// use stockline_core::money::Money;
    /// use stockline_core::types::TaxRate;
    ///
    /// let net = Money::from_cents(3000);
    /// assert_eq!(net.calculate_tax(TaxRate::VAT_STANDARD).cents(), 480);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        // i128: a bulk line times a rate in bps can exceed i64
        let tax = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money(tax as i64)
    }

    /// Net part of an amount that already contains VAT.
    ///
    /// ```rust
    /// use stockline_core::money::Money;
    /// use stockline_core::types::TaxRate;
    ///
    /// let total = Money::from_cents(11600);
    /// assert_eq!(total.net_of_inclusive_tax(TaxRate::VAT_STANDARD).cents(), 10000);
    /// ```
    pub fn net_of_inclusive_tax(&self, rate: TaxRate) -> Money {
        let divisor = 10000_i128 + rate.bps() as i128;
        let net = (self.0 as i128 * 10000 + divisor / 2) / divisor;
        Money(net as i64)
    }
}

/// `1234.50`, for log fields. The console formats currency itself.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}
