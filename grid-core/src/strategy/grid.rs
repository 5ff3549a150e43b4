//! `GridEngine`: the ladder state machine.
//!
//! Grounded line-for-line on `original_source/lib/gridbot/src/gridstrategy.cpp`'s
//! `placeInitialGrid`/`checkFilledOrders`, implemented against the generic
//! [`ExchangeAdapter`] trait so it runs identically against the mock
//! matching engine or a live venue.

use std::collections::HashMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::adapter::ExchangeAdapter;
use crate::core::errors::GridError;
use crate::core::types::{CurrencyPair, GridConfig, GridOrderMeta, OrderStatus, OrderType, Side, TimeInForce};
use crate::risk::{max_inventory_check, sufficient_quote_check};

/// Crossing/fill epsilon shared with the mock matching engine's tolerance.
const EPS: f64 = 1e-12;

pub struct GridEngine {
    config: GridConfig,
    /// Insertion-ordered live order ids: initial ladder, then hedges.
    active_orders: Vec<String>,
    meta: HashMap<String, GridOrderMeta>,
    known_fills: HashMap<String, Decimal>,
}

impl GridEngine {
    pub fn new(config: GridConfig) -> Result<Self, GridError> {
        config.validate()?;
        Ok(Self {
            config,
            active_orders: Vec::new(),
            meta: HashMap::new(),
            known_fills: HashMap::new(),
        })
    }

    pub fn active_orders(&self) -> &[String] {
        &self.active_orders
    }

    pub fn meta(&self, order_id: &str) -> Option<&GridOrderMeta> {
        self.meta.get(order_id)
    }

    /// Place `levels_below` buys and `levels_above` sells around `base_price`.
    /// Restart-safe: consults `meta` first so a re-invocation against
    /// already-populated state never duplicates levels.
    pub async fn place_initial_grid(&mut self, adapter: &dyn ExchangeAdapter) -> Result<(), GridError> {
        if !self.meta.is_empty() {
            return Ok(());
        }

        let base = self.config.base_price;
        let step = self.config.step_pct;
        let qty = self.config.per_order_qty;
        let pair = self.config.pair.clone();

        for i in 1..=self.config.levels_below {
            let price = base * (Decimal::ONE - step * Decimal::from(i));
            self.place_and_track(adapter, &pair, Side::Buy, price, qty).await?;
        }
        for i in 1..=self.config.levels_above {
            let price = base * (Decimal::ONE + step * Decimal::from(i));
            self.place_and_track(adapter, &pair, Side::Sell, price, qty).await?;
        }
        Ok(())
    }

    async fn place_and_track(
        &mut self,
        adapter: &dyn ExchangeAdapter,
        pair: &CurrencyPair,
        side: Side,
        price: Decimal,
        qty: Decimal,
    ) -> Result<(), GridError> {
        let order = adapter
            .place_order(pair, side, OrderType::Limit, TimeInForce::GoodTilCancel, price, qty, None)
            .await
            .map_err(GridError::from)?;

        info!(order_id = %order.order_id, %side, %price, %qty, "Placed order");
        self.active_orders.push(order.order_id.clone());
        self.meta.insert(
            order.order_id.clone(),
            GridOrderMeta {
                side,
                price,
                qty,
                known_filled_qty: Decimal::ZERO,
            },
        );
        self.known_fills.insert(order.order_id, Decimal::ZERO);
        Ok(())
    }

    /// One reconciliation tick. Snapshots `active_orders` at entry so a
    /// hedge placed mid-tick is not reconciled until the following tick.
    pub async fn check_filled_orders(
        &mut self,
        adapter: &dyn ExchangeAdapter,
        current_btc: Decimal,
        current_usdt: Decimal,
    ) -> Result<(), GridError> {
        let snapshot = self.active_orders.clone();
        let mut to_remove = Vec::new();
        let mut btc = current_btc;
        let mut usdt = current_usdt;

        for oid in &snapshot {
            let order = match adapter.query_order(&self.config.pair, oid, None).await {
                Ok(order) => order,
                Err(_) => continue, // soft: NotFound/transport, retry next tick
            };

            let Some(meta) = self.meta.get(oid).cloned() else {
                continue;
            };

            match order.status {
                OrderStatus::Filled => {
                    self.place_hedge(adapter, &meta, meta.qty, &mut btc, &mut usdt).await?;
                    to_remove.push(oid.clone());
                }
                OrderStatus::PartiallyFilled => {
                    let known = self.known_fills.get(oid).copied().unwrap_or(Decimal::ZERO);
                    let delta = order.filled - known;
                    if delta.abs().to_f64().unwrap_or(0.0) > EPS {
                        self.known_fills.insert(oid.clone(), order.filled);
                        if let Some(m) = self.meta.get_mut(oid) {
                            m.known_filled_qty = order.filled;
                        }
                        info!(order_id = %oid, %delta, "Detected new partial fill");
                        self.place_hedge(adapter, &meta, delta, &mut btc, &mut usdt).await?;
                    }
                }
                OrderStatus::Rejected | OrderStatus::Canceled | OrderStatus::Expired => {
                    to_remove.push(oid.clone());
                }
                OrderStatus::New | OrderStatus::NotSent => {}
            }

            // Yield between orders so a long ladder doesn't monopolize the tick loop.
            tokio::task::yield_now().await;
        }

        for oid in to_remove {
            self.active_orders.retain(|id| id != &oid);
            self.meta.remove(&oid);
            self.known_fills.remove(&oid);
        }

        Ok(())
    }

    /// Place the opposite-side hedge one step away from the filled order's
    /// price, for `hedge_qty` (the original quantity for a full fill, the
    /// incremental delta for a partial fill). Skips (logs WARN, does not
    /// retry) on inventory/balance shortfall; the original fill is never
    /// unwound.
    async fn place_hedge(
        &mut self,
        adapter: &dyn ExchangeAdapter,
        filled_meta: &GridOrderMeta,
        hedge_qty: Decimal,
        btc: &mut Decimal,
        usdt: &mut Decimal,
    ) -> Result<(), GridError> {
        let step = self.config.step_pct;
        let pair = self.config.pair.clone();

        match filled_meta.side {
            Side::Buy => {
                let hedge_price = filled_meta.price * (Decimal::ONE + step);
                if !max_inventory_check(*btc, self.config.max_inventory) {
                    warn!("Max position exceeded, not placing hedge sell");
                    return Ok(());
                }
                self.place_and_track(adapter, &pair, Side::Sell, hedge_price, hedge_qty).await?;
                *btc -= hedge_qty;
            }
            Side::Sell => {
                let hedge_price = filled_meta.price * (Decimal::ONE - step);
                let cost = hedge_price * hedge_qty;
                if !sufficient_quote_check(*usdt, cost) {
                    warn!("Insufficient USDT to place rebuy");
                    return Ok(());
                }
                self.place_and_track(adapter, &pair, Side::Buy, hedge_price, hedge_qty).await?;
                *usdt -= cost;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockExchange;
    use rust_decimal_macros::dec;

    fn pair() -> CurrencyPair {
        CurrencyPair::parse("BTC/USDT").unwrap()
    }

    fn config() -> GridConfig {
        GridConfig {
            pair: pair(),
            base_price: dec!(30000),
            levels_below: 2,
            levels_above: 2,
            step_pct: dec!(0.005),
            per_order_qty: dec!(0.001),
            max_inventory: dec!(1.0),
            fee_rate: dec!(0),
        }
    }

    #[tokio::test]
    async fn s1_initial_ladder_places_in_order_with_exact_prices() {
        let mock = MockExchange::new(dec!(30000), dec!(0), dec!(1), dec!(1), dec!(0), 1);
        mock.set_balances(dec!(1_000_000), dec!(0));
        let mut engine = GridEngine::new(config()).unwrap();
        engine.place_initial_grid(&mock).await.unwrap();

        assert_eq!(engine.active_orders().len(), 4);
        let prices: Vec<Decimal> = engine
            .active_orders()
            .iter()
            .map(|id| engine.meta(id).unwrap().price)
            .collect();
        assert_eq!(prices, vec![dec!(29850), dec!(29700), dec!(30150), dec!(30300)]);
    }

    #[tokio::test]
    async fn s1_restart_does_not_duplicate_levels() {
        let mock = MockExchange::new(dec!(30000), dec!(0), dec!(1), dec!(1), dec!(0), 1);
        mock.set_balances(dec!(1_000_000), dec!(0));
        let mut engine = GridEngine::new(config()).unwrap();
        engine.place_initial_grid(&mock).await.unwrap();
        engine.place_initial_grid(&mock).await.unwrap();
        assert_eq!(engine.active_orders().len(), 4);
    }

    #[tokio::test]
    async fn s2_full_buy_fill_places_sell_hedge() {
        let mock = MockExchange::new(dec!(30000), dec!(0), dec!(1), dec!(1), dec!(0), 1);
        mock.set_balances(dec!(1_000_000), dec!(0));
        let mut engine = GridEngine::new(config()).unwrap();
        engine.place_initial_grid(&mock).await.unwrap();

        mock.simulate_price_move(dec!(29850));
        engine.check_filled_orders(&mock, dec!(0), dec!(1_000_000)).await.unwrap();

        assert_eq!(engine.active_orders().len(), 4);
        let hedge_price = engine
            .active_orders()
            .iter()
            .map(|id| engine.meta(id).unwrap())
            .find(|m| m.side == Side::Sell && m.price == dec!(29850) * dec!(1.005))
            .expect("hedge sell should be present");
        assert_eq!(hedge_price.qty, dec!(0.001));
        assert_eq!(mock.get_balance("BTC"), dec!(0.001));
    }

    #[tokio::test]
    async fn s3_partial_fill_hedges_delta_and_is_idempotent_next_tick() {
        let mock = MockExchange::new(dec!(30000), dec!(0), dec!(0.5), dec!(0.5), dec!(0), 1);
        mock.set_balances(dec!(1_000_000), dec!(0));
        let mut engine = GridEngine::new(config()).unwrap();
        engine.place_initial_grid(&mock).await.unwrap();

        mock.simulate_price_move(dec!(29850));
        engine.check_filled_orders(&mock, dec!(0), dec!(1_000_000)).await.unwrap();
        // Partially filled order remains active, plus one hedge for the delta.
        assert_eq!(engine.active_orders().len(), 5);

        let before = engine.active_orders().len();
        engine.check_filled_orders(&mock, dec!(0.0005), dec!(1_000_000)).await.unwrap();
        assert_eq!(engine.active_orders().len(), before);
    }

    #[tokio::test]
    async fn s4_inventory_cap_skips_hedge_without_retiring_fill() {
        let mut cfg = config();
        cfg.max_inventory = dec!(0.001);
        let mock = MockExchange::new(dec!(30000), dec!(0), dec!(1), dec!(1), dec!(0), 1);
        mock.set_balances(dec!(1_000_000), dec!(0.001));
        let mut engine = GridEngine::new(cfg).unwrap();
        engine.place_initial_grid(&mock).await.unwrap();
        let before = engine.active_orders().len();

        mock.simulate_price_move(dec!(29850));
        engine.check_filled_orders(&mock, dec!(0.001), dec!(1_000_000)).await.unwrap();

        // The filled buy retires; no hedge sell appears because inventory is at cap.
        assert_eq!(engine.active_orders().len(), before - 1);
        assert!(engine
            .active_orders()
            .iter()
            .all(|id| engine.meta(id).unwrap().side != Side::Sell || engine.meta(id).unwrap().price != dec!(29850) * dec!(1.005)));
    }

    #[tokio::test]
    async fn s5_reject_on_insufficient_funds_leaves_balances_unchanged() {
        let mock = MockExchange::new(dec!(1000), dec!(0), dec!(1), dec!(1), dec!(0), 1);
        mock.set_balances(dec!(10), dec!(0));
        let order = mock.place_limit_order(&pair(), Side::Buy, dec!(1000), dec!(1.0));
        mock.simulate_price_move(dec!(1000));
        let result = mock.get_order(&order.order_id).unwrap();
        assert_eq!(result.status, OrderStatus::Rejected);
        assert_eq!(mock.get_balance("USDT"), dec!(10));
        assert_eq!(mock.get_balance("BTC"), dec!(0));
    }
}
