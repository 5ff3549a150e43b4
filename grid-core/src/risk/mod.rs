//! Pre-trade checks the grid engine calls before placing a hedge.
//!
//! Kept as free functions over `Decimal`, not an object, since the grid
//! engine is single-pair/single-threaded and the heavier multi-position
//! `RiskManager` (daily-loss limits, rate limiting) this is grounded on is
//! explicitly out of scope here.

use rust_decimal::Decimal;

/// `true` iff the current BTC inventory is within the configured cap
/// (within epsilon). Checked before placing a sell hedge in response to a
/// filled buy, per the domain model's "current inventory <= maxInventory + eps".
pub fn max_inventory_check(current_btc: Decimal, max_inventory: Decimal) -> bool {
    let eps = Decimal::new(1, 12);
    current_btc <= max_inventory + eps
}

/// `true` iff `usdt` covers `cost` within epsilon.
pub fn sufficient_quote_check(usdt: Decimal, cost: Decimal) -> bool {
    let eps = Decimal::new(1, 12);
    usdt >= cost - eps
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn sufficient_quote_check_allows_exact_match() {
        assert!(sufficient_quote_check(dec!(100), dec!(100)));
        assert!(!sufficient_quote_check(dec!(99), dec!(100)));
    }

    #[test]
    fn max_inventory_check_respects_cap() {
        assert!(max_inventory_check(dec!(0.5), dec!(1.0)));
        assert!(!max_inventory_check(dec!(2.0), dec!(1.0)));
    }

    fn decimal_cents(raw: i64) -> Decimal {
        Decimal::new(raw.abs(), 2)
    }

    proptest! {
        /// Any inventory exactly at the cap is accepted, and bumping it past
        /// the cap by more than epsilon is always rejected.
        #[test]
        fn max_inventory_check_is_monotonic(cap_raw in 0i64..1_000_000, over_raw in 1i64..1_000_000) {
            let cap = decimal_cents(cap_raw);
            let over = decimal_cents(over_raw);
            prop_assert!(max_inventory_check(cap, cap));
            prop_assert!(!max_inventory_check(cap + over, cap));
        }

        /// Quote sufficiency never accepts a cost strictly greater than the
        /// available balance by more than the epsilon band.
        #[test]
        fn sufficient_quote_check_rejects_any_real_shortfall(usdt_raw in 0i64..1_000_000, shortfall_raw in 1i64..1_000_000) {
            let usdt = decimal_cents(usdt_raw);
            let shortfall = decimal_cents(shortfall_raw);
            prop_assert!(!sufficient_quote_check(usdt, usdt + shortfall));
        }
    }
}
