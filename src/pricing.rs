//! Order price computation.
//!
//! Every amount is an integer count of minor currency units (paise for INR).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const BPS_DENOMINATOR: i64 = 10_000;

/// Flat-rate shipping and tax constants applied to every order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PricingPolicy {
    /// Orders whose items price is strictly above this ship for free.
    pub free_shipping_threshold: i64,
    pub flat_shipping_fee: i64,
    /// Tax rate in basis points (1800 = 18%).
    pub tax_rate_bps: i64,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            free_shipping_threshold: 100_000,
            flat_shipping_fee: 5_000,
            tax_rate_bps: 1_800,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct OrderTotals {
    pub items_price: i64,
    pub shipping_price: i64,
    pub tax_price: i64,
    pub total_price: i64,
}

impl PricingPolicy {
    pub fn shipping_for(&self, items_price: i64) -> i64 {
        if items_price > self.free_shipping_threshold {
            0
        } else {
            self.flat_shipping_fee
        }
    }

    /// Tax rounded half-up to the nearest minor unit.
    pub fn tax_for(&self, items_price: i64) -> i64 {
        (items_price * self.tax_rate_bps + BPS_DENOMINATOR / 2) / BPS_DENOMINATOR
    }

    pub fn totals(&self, items_price: i64) -> OrderTotals {
        let shipping_price = self.shipping_for(items_price);
        let tax_price = self.tax_for(items_price);
        OrderTotals {
            items_price,
            shipping_price,
            tax_price,
            total_price: items_price + shipping_price + tax_price,
        }
    }
}

/// Sum of `quantity * unit_price` over `(quantity, unit_price)` pairs.
pub fn items_price<I>(lines: I) -> i64
where
    I: IntoIterator<Item = (i32, i64)>,
{
    lines
        .into_iter()
        .map(|(quantity, unit_price)| i64::from(quantity) * unit_price)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn large_orders_ship_free() {
        let totals = PricingPolicy::default().totals(120_000);
        assert_eq!(totals.shipping_price, 0);
        assert_eq!(totals.tax_price, 21_600);
        assert_eq!(totals.total_price, 141_600);
    }

    #[test]
    fn small_orders_pay_flat_fee() {
        let totals = PricingPolicy::default().totals(50_000);
        assert_eq!(totals.shipping_price, 5_000);
        assert_eq!(totals.tax_price, 9_000);
        assert_eq!(totals.total_price, 64_000);
    }

    #[test]
    fn threshold_itself_is_not_free() {
        let policy = PricingPolicy::default();
        assert_eq!(policy.shipping_for(100_000), 5_000);
        assert_eq!(policy.shipping_for(100_001), 0);
    }

    #[test]
    fn two_units_of_one_hundred() {
        let items = items_price([(2, 10_000)]);
        let totals = PricingPolicy::default().totals(items);
        assert_eq!(
            totals,
            OrderTotals {
                items_price: 20_000,
                shipping_price: 5_000,
                tax_price: 3_600,
                total_price: 28_600,
            }
        );
    }

    #[test]
    fn tax_rounds_half_up() {
        let policy = PricingPolicy::default();
        // 18% of 25 = 4.5
        assert_eq!(policy.tax_for(25), 5);
        // 18% of 22 = 3.96
        assert_eq!(policy.tax_for(22), 4);
        // 18% of 2 = 0.36
        assert_eq!(policy.tax_for(2), 0);
    }
}
