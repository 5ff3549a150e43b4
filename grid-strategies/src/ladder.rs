//! Step-ladder price math and a small builder for [`GridConfig`].
//!
//! Grounded on `original_source/lib/gridbot/src/gridstrategy.cpp`'s
//! `placeInitialGrid` loop, factored out of `GridEngine` itself so the
//! price math can be unit-tested independently of order placement.

use grid_core::core::errors::GridError;
use grid_core::core::types::{CurrencyPair, GridConfig};
use rust_decimal::Decimal;

/// Buy-side ladder prices, nearest-to-furthest from `base_price`, one
/// `step_pct` apart: `base * (1 - step)`, `base * (1 - 2*step)`, ...
pub fn buy_levels(base_price: Decimal, step_pct: Decimal, levels: u32) -> Vec<Decimal> {
    (1..=levels)
        .map(|i| base_price * (Decimal::ONE - step_pct * Decimal::from(i)))
        .collect()
}

/// Sell-side ladder prices, nearest-to-furthest from `base_price`:
/// `base * (1 + step)`, `base * (1 + 2*step)`, ...
pub fn sell_levels(base_price: Decimal, step_pct: Decimal, levels: u32) -> Vec<Decimal> {
    (1..=levels)
        .map(|i| base_price * (Decimal::ONE + step_pct * Decimal::from(i)))
        .collect()
}

/// Fluent construction of a [`GridConfig`], defaulting `fee_rate` to zero
/// and `max_inventory` to `per_order_qty * levels_below` (the worst case
/// of every buy level filling once) when not set explicitly.
#[derive(Debug, Clone)]
pub struct GridConfigBuilder {
    pair: CurrencyPair,
    base_price: Decimal,
    levels_below: u32,
    levels_above: u32,
    step_pct: Decimal,
    per_order_qty: Decimal,
    max_inventory: Option<Decimal>,
    fee_rate: Decimal,
}

impl GridConfigBuilder {
    pub fn new(pair: CurrencyPair, base_price: Decimal, step_pct: Decimal, per_order_qty: Decimal) -> Self {
        Self {
            pair,
            base_price,
            levels_below: 5,
            levels_above: 5,
            step_pct,
            per_order_qty,
            max_inventory: None,
            fee_rate: Decimal::ZERO,
        }
    }

    pub fn levels_below(mut self, n: u32) -> Self {
        self.levels_below = n;
        self
    }

    pub fn levels_above(mut self, n: u32) -> Self {
        self.levels_above = n;
        self
    }

    pub fn max_inventory(mut self, qty: Decimal) -> Self {
        self.max_inventory = Some(qty);
        self
    }

    pub fn fee_rate(mut self, rate: Decimal) -> Self {
        self.fee_rate = rate;
        self
    }

    pub fn build(self) -> Result<GridConfig, GridError> {
        let max_inventory = self
            .max_inventory
            .unwrap_or(self.per_order_qty * Decimal::from(self.levels_below.max(1)));

        let config = GridConfig {
            pair: self.pair,
            base_price: self.base_price,
            levels_below: self.levels_below,
            levels_above: self.levels_above,
            step_pct: self.step_pct,
            per_order_qty: self.per_order_qty,
            max_inventory,
            fee_rate: self.fee_rate,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn pair() -> CurrencyPair {
        CurrencyPair::parse("BTC/USDT").unwrap()
    }

    #[test]
    fn buy_levels_descend_away_from_base() {
        let levels = buy_levels(dec!(30000), dec!(0.005), 3);
        assert_eq!(levels, vec![dec!(29850), dec!(29700), dec!(29550)]);
    }

    #[test]
    fn sell_levels_ascend_away_from_base() {
        let levels = sell_levels(dec!(30000), dec!(0.005), 3);
        assert_eq!(levels, vec![dec!(30150), dec!(30300), dec!(30450)]);
    }

    #[test]
    fn builder_defaults_max_inventory_to_worst_case_buy_fill() {
        let config = GridConfigBuilder::new(pair(), dec!(30000), dec!(0.005), dec!(0.01))
            .levels_below(4)
            .build()
            .unwrap();
        assert_eq!(config.max_inventory, dec!(0.04));
    }

    #[test]
    fn builder_rejects_invalid_step_pct() {
        let err = GridConfigBuilder::new(pair(), dec!(30000), dec!(0), dec!(0.01)).build();
        assert!(err.is_err());
    }
}
