//! Charge breakdown arithmetic.
//!
//! Every intermediate amount is rounded to paise before it feeds the next
//! sum, so a breakdown always closes: `subtotal` is exactly the sum of its
//! rounded parts and `total` is exactly `subtotal + gst`.

use crate::models::RatePricing;
use crate::services::error::BillingError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Round half away from zero to two decimal places.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Reject a value with more than two decimal places. Money and percentage
/// columns are `NUMERIC(_, 2)` and would round it on write.
pub fn ensure_two_places(field: &str, value: Decimal) -> Result<(), BillingError> {
    if value.normalize().scale() > 2 {
        return Err(BillingError::Validation(format!(
            "{} must have at most two decimal places, got {}",
            field, value
        )));
    }
    Ok(())
}

/// Priced charge components for one shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateBreakdown {
    pub base: Decimal,
    pub fuel_pct: Decimal,
    pub fuel: Decimal,
    pub packing: Decimal,
    pub handling: Decimal,
    pub subtotal: Decimal,
    pub gst_pct: Decimal,
    pub gst: Decimal,
    pub total: Decimal,
}

impl RateBreakdown {
    pub fn compute(
        base: Decimal,
        fuel_pct: Decimal,
        packing: Decimal,
        handling: Decimal,
        gst_pct: Decimal,
    ) -> Self {
        let base = round2(base);
        let packing = round2(packing);
        let handling = round2(handling);
        let fuel = round2(base * fuel_pct / HUNDRED);
        let subtotal = base + fuel + packing + handling;
        let gst = round2(subtotal * gst_pct / HUNDRED);

        Self {
            base,
            fuel_pct,
            fuel,
            packing,
            handling,
            subtotal,
            gst_pct,
            gst,
            total: subtotal + gst,
        }
    }

    pub fn from_pricing(pricing: &RatePricing) -> Self {
        Self::compute(
            pricing.rate,
            pricing.fuel_pct,
            pricing.packing,
            pricing.handling,
            pricing.gst_pct,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round2(dec!(1.005)), dec!(1.01));
        assert_eq!(round2(dec!(1.004)), dec!(1.00));
        assert_eq!(round2(dec!(-1.005)), dec!(-1.01));
    }

    #[test]
    fn more_than_two_places_is_rejected() {
        assert!(ensure_two_places("amount", dec!(10.25)).is_ok());
        assert!(ensure_two_places("amount", dec!(10.2500)).is_ok());
        assert!(ensure_two_places("amount", dec!(0)).is_ok());
        assert!(matches!(
            ensure_two_places("amount", dec!(0.001)),
            Err(BillingError::Validation(msg)) if msg.contains("amount")
        ));
    }

    #[test]
    fn computes_full_breakdown() {
        let b = RateBreakdown::compute(dec!(100), dec!(12.5), dec!(10), dec!(5), dec!(18));
        assert_eq!(b.fuel, dec!(12.50));
        assert_eq!(b.subtotal, dec!(127.50));
        assert_eq!(b.gst, dec!(22.95));
        assert_eq!(b.total, dec!(150.45));
    }

    #[test]
    fn intermediate_rounding_closes() {
        let cases = [
            (dec!(33.33), dec!(7.77), dec!(1.11), dec!(0.99), dec!(18)),
            (dec!(0.01), dec!(33.333), dec!(0), dec!(0), dec!(5)),
            (dec!(99.995), dec!(15), dec!(2.505), dec!(3.333), dec!(12)),
            (dec!(1234.56), dec!(0), dec!(0), dec!(0), dec!(0)),
        ];

        for (base, fuel_pct, packing, handling, gst_pct) in cases {
            let b = RateBreakdown::compute(base, fuel_pct, packing, handling, gst_pct);
            assert_eq!(round2(b.base + b.fuel + b.packing + b.handling), b.subtotal);
            assert_eq!(round2(b.subtotal + b.gst), b.total);
            assert!(b.total.scale() <= 2);
        }
    }

    #[test]
    fn zero_percentages_leave_base_untouched() {
        let b = RateBreakdown::compute(dec!(45), dec!(0), dec!(0), dec!(0), dec!(0));
        assert_eq!(b.fuel, Decimal::ZERO);
        assert_eq!(b.gst, Decimal::ZERO);
        assert_eq!(b.total, dec!(45));
    }
}
