//! Cart pricing.
//!
//! [`CartPricer::price`] is a pure function of its inputs: no I/O, no clock, no
//! randomness. The same inputs always produce the same [`PriceBreakdown`], which
//! is what lets checkout and order-summary display share it.
//!
//! All arithmetic is integer arithmetic on minor units. Rates are expressed in
//! basis points so rounding is exact and platform independent; halves round up.

use serde::{Deserialize, Serialize};

use crate::types::Money;

/// Service fee rate in basis points (1/100 of a percent). `1000` is 10%.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceFeeRate(u32);

impl ServiceFeeRate {
    /// No service fee.
    pub const ZERO: Self = Self(0);

    /// Creates a rate from basis points.
    #[must_use]
    pub const fn from_basis_points(bps: u32) -> Self {
        Self(bps)
    }

    /// Rate in basis points.
    #[must_use]
    pub const fn basis_points(&self) -> u32 {
        self.0
    }

    /// Fee for `subtotal`, rounded half up to the nearest minor unit.
    #[must_use]
    pub fn fee_for(&self, subtotal: Money) -> Money {
        Money::from_cents(scale_rounded(subtotal.cents(), u64::from(self.0), 10_000))
    }
}

/// `round(amount * numerator / denominator)`, halves rounded up, saturating.
pub(crate) fn scale_rounded(amount: u64, numerator: u64, denominator: u64) -> u64 {
    let scaled = u128::from(amount) * u128::from(numerator);
    let rounded = (scaled + u128::from(denominator / 2)) / u128::from(denominator);
    u64::try_from(rounded).unwrap_or(u64::MAX)
}

/// Totals for a cart.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    /// Sum of `unit_price * quantity`
    pub subtotal: Money,
    /// `round(subtotal * rate)`
    pub service_fee: Money,
    /// Discount applied, as supplied by the caller
    pub discount_amount: Money,
    /// `max(0, subtotal + service_fee - discount_amount)`
    pub total: Money,
}

/// Pure cart pricing.
#[derive(Clone, Copy, Debug, Default)]
pub struct CartPricer;

impl CartPricer {
    /// Sum of `unit_price * quantity` over all lines.
    #[must_use]
    pub fn subtotal(lines: &[(Money, u32)]) -> Money {
        lines
            .iter()
            .fold(Money::ZERO, |acc, (unit_price, quantity)| {
                acc.saturating_add(unit_price.saturating_mul(*quantity))
            })
    }

    /// Price a cart.
    ///
    /// `lines` are `(unit_price, quantity)` pairs. The discount is applied after the
    /// service fee and the total never goes below zero.
    #[must_use]
    pub fn price(
        lines: &[(Money, u32)],
        service_fee_rate: ServiceFeeRate,
        discount_amount: Money,
    ) -> PriceBreakdown {
        let subtotal = Self::subtotal(lines);
        let service_fee = service_fee_rate.fee_for(subtotal);
        let total = subtotal
            .saturating_add(service_fee)
            .saturating_sub(discount_amount);

        PriceBreakdown {
            subtotal,
            service_fee,
            discount_amount,
            total,
        }
    }
}
