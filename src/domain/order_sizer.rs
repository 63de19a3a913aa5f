//! Order Sizer
//!
//! Fixed-fraction position sizing: spend `allocation_fraction` of the quote
//! balance at `price`, rounded to the exchange's 8 decimal places.
//! Lot-size and min-notional filters are left to the exchange.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

/// Default share of the quote balance committed per trade
pub const DEFAULT_ALLOCATION_FRACTION: f64 = 0.10;

/// Exchange quantity precision
pub const QUANTITY_DECIMALS: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderSizer {
    allocation_fraction: f64,
}

impl Default for OrderSizer {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOCATION_FRACTION)
    }
}

impl OrderSizer {
    pub fn new(allocation_fraction: f64) -> Self {
        Self { allocation_fraction }
    }

    pub fn allocation_fraction(&self) -> f64 {
        self.allocation_fraction
    }

    /// Quantity for the configured fraction
    pub fn quantity(&self, balance: f64, price: f64) -> f64 {
        size(balance, price, self.allocation_fraction)
    }
}

/// `round(balance / price * allocation_fraction, 8)`.
///
/// Returns 0 for a non-positive or non-finite price.
pub fn size(balance: f64, price: f64, allocation_fraction: f64) -> f64 {
    if !price.is_finite() || price <= 0.0 {
        return 0.0;
    }
    round_to_exchange_precision(balance / price * allocation_fraction)
}

/// Round to `QUANTITY_DECIMALS` fractional digits.
pub fn round_to_exchange_precision(value: f64) -> f64 {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(QUANTITY_DECIMALS))
        .and_then(|d| d.to_f64())
        .unwrap_or(0.0)
}
