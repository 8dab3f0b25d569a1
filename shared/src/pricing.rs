use bigdecimal::{BigDecimal, RoundingMode};
use num_traits::Zero;
use serde::{Deserialize, Serialize};

/// Scale of every stored money column.
pub const MONEY_SCALE: i64 = 2;

/// Rounds to cents, half-even.
pub fn money(value: &BigDecimal) -> BigDecimal {
    value.with_scale_round(MONEY_SCALE, RoundingMode::HalfEven)
}

pub fn line_total(unit_price: &BigDecimal, quantity: i32) -> BigDecimal {
    money(&(unit_price * BigDecimal::from(quantity)))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Orders with a subtotal strictly above this ship for free.
    pub free_shipping_threshold: BigDecimal,
    pub shipping_rate: BigDecimal,
    pub tax_rate: BigDecimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            free_shipping_threshold: BigDecimal::new(5000.into(), 2),
            shipping_rate: BigDecimal::new(999.into(), 2),
            tax_rate: BigDecimal::new(8.into(), 2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: BigDecimal,
    pub shipping: BigDecimal,
    pub tax: BigDecimal,
    pub total: BigDecimal,
}

impl PricingConfig {
    pub fn shipping_for(&self, subtotal: &BigDecimal) -> BigDecimal {
        if subtotal > &self.free_shipping_threshold {
            money(&BigDecimal::zero())
        } else {
            money(&self.shipping_rate)
        }
    }

    pub fn tax_for(&self, subtotal: &BigDecimal) -> BigDecimal {
        money(&(subtotal * &self.tax_rate))
    }

    /// Totals for a set of already-priced line totals.
    pub fn totals<'a, I>(&self, line_totals: I) -> Totals
    where
        I: IntoIterator<Item = &'a BigDecimal>,
    {
        let subtotal = money(
            &line_totals
                .into_iter()
                .fold(BigDecimal::zero(), |acc, line| acc + line),
        );
        let shipping = self.shipping_for(&subtotal);
        let tax = self.tax_for(&subtotal);
        let total = money(&(&subtotal + &shipping + &tax));

        Totals {
            subtotal,
            shipping,
            tax,
            total,
        }
    }
}
