//! Deterministic in-memory matching engine used for development and tests.
//!
//! Grounded line-for-line on `original_source/lib/gridbot/include/exchange.h`'s
//! `MockExchange`: partial fills, slippage, fee deduction, and balance
//! accounting, seeded so runs are reproducible. Implements the same
//! [`ExchangeAdapter`] trait a live venue adapter implements, so a
//! simulated run and a production run are interchangeable from the
//! strategy's point of view.

use std::collections::HashMap;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::adapter::ExchangeAdapter;
use crate::core::errors::AdapterError;
use crate::core::types::{CurrencyPair, ExecutionReport, Order, OrderStatus, OrderType, Side, TimeInForce};

/// Crossing tolerance: fills/crossings within this distance of exact
/// equality are treated as equal, matching the original's `eps = 1e-12`.
const EPS: f64 = 1e-12;

struct MockState {
    balances: HashMap<String, Decimal>,
    orders: HashMap<String, Order>,
    next_id: u64,
    price: Decimal,
    rng: StdRng,
}

pub struct MockExchange {
    state: Mutex<MockState>,
    fee_rate: Decimal,
    partial_min: Decimal,
    partial_max: Decimal,
    slippage_max: Decimal,
}

impl MockExchange {
    /// Construct with an explicit seed, per spec: "the pseudo-random
    /// source is seeded at construction; tests may inject a fixed seed."
    pub fn new(
        initial_price: Decimal,
        fee_rate: Decimal,
        partial_min: Decimal,
        partial_max: Decimal,
        slippage_max: Decimal,
        seed: u64,
    ) -> Self {
        let mut balances = HashMap::new();
        balances.insert("USDT".to_string(), Decimal::ZERO);
        balances.insert("BTC".to_string(), Decimal::ZERO);

        Self {
            state: Mutex::new(MockState {
                balances,
                orders: HashMap::new(),
                next_id: 1,
                price: initial_price,
                rng: StdRng::seed_from_u64(seed),
            }),
            fee_rate,
            partial_min,
            partial_max,
            slippage_max,
        }
    }

    pub fn new_random(
        initial_price: Decimal,
        fee_rate: Decimal,
        partial_min: Decimal,
        partial_max: Decimal,
        slippage_max: Decimal,
    ) -> Self {
        Self::new(initial_price, fee_rate, partial_min, partial_max, slippage_max, rand::random())
    }

    pub fn set_balances(&self, usdt: Decimal, btc: Decimal) {
        let mut state = self.state.lock();
        state.balances.insert("USDT".to_string(), usdt);
        state.balances.insert("BTC".to_string(), btc);
    }

    pub fn get_balance(&self, asset: &str) -> Decimal {
        self.state.lock().balances.get(asset).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn dump_balances(&self) -> HashMap<String, Decimal> {
        self.state.lock().balances.clone()
    }

    pub fn get_ticker(&self) -> (Decimal, Decimal, Decimal) {
        let price = self.state.lock().price;
        let spread = Decimal::new(5, 4); // 0.0005
        let bid = price * (Decimal::ONE - spread);
        let ask = price * (Decimal::ONE + spread);
        (bid, ask, price)
    }

    pub fn place_limit_order(
        &self,
        pair: &CurrencyPair,
        side: Side,
        price: Decimal,
        qty: Decimal,
    ) -> Order {
        let mut state = self.state.lock();
        let id = format!("o{}", state.next_id);
        state.next_id += 1;

        let order = Order {
            order_id: id.clone(),
            client_order_id: None,
            pair: pair.clone(),
            side,
            order_type: OrderType::Limit,
            price,
            quantity: qty,
            filled: Decimal::ZERO,
            status: OrderStatus::New,
        };
        state.orders.insert(id.clone(), order.clone());
        info!(order_id = %id, %side, %price, %qty, "Placed order");
        order
    }

    pub fn get_order(&self, order_id: &str) -> Option<Order> {
        self.state.lock().orders.get(order_id).cloned()
    }

    pub fn cancel(&self, order_id: &str) -> Option<Order> {
        let mut state = self.state.lock();
        let order = state.orders.get_mut(order_id)?;
        if !order.status.is_terminal() {
            order.status = OrderStatus::Canceled;
            info!(order_id, "Canceled order");
        }
        Some(order.clone())
    }

    /// Move the reference price, then for every non-terminal order, test
    /// crossing and settle one partial/full fill per crossing order.
    pub fn simulate_price_move(&self, new_price: Decimal) -> Vec<Order> {
        let mut state = self.state.lock();
        state.price = new_price;

        let crossing_ids: Vec<String> = state
            .orders
            .values()
            .filter(|o| !o.status.is_terminal())
            .filter(|o| Self::crosses(o.side, o.price, new_price))
            .map(|o| o.order_id.clone())
            .collect();

        let mut updated = Vec::with_capacity(crossing_ids.len());
        for id in crossing_ids {
            if let Some(order) = self.settle_one(&mut state, &id) {
                updated.push(order);
            }
        }
        updated
    }

    fn crosses(side: Side, order_price: Decimal, market_price: Decimal) -> bool {
        let eps = Decimal::try_from(EPS).unwrap_or(Decimal::ZERO);
        match side {
            Side::Buy => market_price <= order_price + eps,
            Side::Sell => market_price >= order_price - eps,
        }
    }

    fn settle_one(&self, state: &mut MockState, order_id: &str) -> Option<Order> {
        let remaining = {
            let order = state.orders.get(order_id)?;
            order.quantity - order.filled
        };

        let partial_min = self.partial_min.to_f64().unwrap_or(1.0).clamp(0.0, 1.0);
        let partial_max = self.partial_max.to_f64().unwrap_or(1.0).clamp(0.0, 1.0);
        let (lo, hi) = if partial_min <= partial_max {
            (partial_min, partial_max)
        } else {
            (partial_max, partial_min)
        };
        let pct = if (hi - lo).abs() < f64::EPSILON {
            lo
        } else {
            state.rng.gen_range(lo..=hi)
        };
        let fill_qty = remaining * Decimal::try_from(pct).unwrap_or(Decimal::ONE);

        if fill_qty.to_f64().unwrap_or(0.0).abs() < EPS {
            return None;
        }

        let slip_max = self.slippage_max.to_f64().unwrap_or(0.0);
        let u = if slip_max.abs() < f64::EPSILON {
            0.0
        } else {
            state.rng.gen_range(-slip_max..=slip_max)
        };

        let order_price = state.orders.get(order_id)?.price;
        let exec_price = order_price * (Decimal::ONE + Decimal::try_from(u).unwrap_or(Decimal::ZERO));
        let side = state.orders.get(order_id)?.side;
        let eps_dec = Decimal::try_from(EPS).unwrap_or(Decimal::ZERO);

        match side {
            Side::Buy => {
                let cost = fill_qty * exec_price;
                let usdt = state.balances.get("USDT").copied().unwrap_or(Decimal::ZERO);
                if usdt < cost - eps_dec {
                    let order = state.orders.get_mut(order_id)?;
                    order.status = OrderStatus::Rejected;
                    warn!(order_id, "Rejected buy order: insufficient USDT");
                    return Some(order.clone());
                }
                let received = fill_qty * (Decimal::ONE - self.fee_rate);
                *state.balances.get_mut("USDT").unwrap() -= cost;
                *state.balances.get_mut("BTC").unwrap() += received;
            }
            Side::Sell => {
                let btc = state.balances.get("BTC").copied().unwrap_or(Decimal::ZERO);
                if btc < fill_qty - eps_dec {
                    let order = state.orders.get_mut(order_id)?;
                    order.status = OrderStatus::Rejected;
                    warn!(order_id, "Rejected sell order: insufficient BTC");
                    return Some(order.clone());
                }
                let proceeds = fill_qty * exec_price * (Decimal::ONE - self.fee_rate);
                *state.balances.get_mut("BTC").unwrap() -= fill_qty;
                *state.balances.get_mut("USDT").unwrap() += proceeds;
            }
        }

        let order = state.orders.get_mut(order_id)?;
        order.filled += fill_qty;
        order.status = if order.filled + eps_dec >= order.quantity {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        info!(order_id, status = ?order.status, filled = %order.filled, "Order fill settled");
        Some(order.clone())
    }
}

#[async_trait::async_trait]
impl ExchangeAdapter for MockExchange {
    async fn place_order(
        &self,
        pair: &CurrencyPair,
        side: Side,
        _order_type: OrderType,
        _tif: TimeInForce,
        price: Decimal,
        qty: Decimal,
        _client_id: Option<&str>,
    ) -> Result<Order, AdapterError> {
        Ok(self.place_limit_order(pair, side, price, qty))
    }

    async fn query_order(
        &self,
        _pair: &CurrencyPair,
        order_id: &str,
        _client_id: Option<&str>,
    ) -> Result<Order, AdapterError> {
        self.get_order(order_id)
            .ok_or_else(|| AdapterError::InvalidResponse(format!("order {order_id} not found")))
    }

    async fn cancel_order(
        &self,
        _pair: &CurrencyPair,
        order_id: &str,
        _client_id: Option<&str>,
    ) -> Result<Order, AdapterError> {
        self.cancel(order_id)
            .ok_or_else(|| AdapterError::InvalidResponse(format!("order {order_id} not found")))
    }

    fn translate_order_result(&self, _json: &serde_json::Value) -> Vec<ExecutionReport> {
        // The mock never produces raw venue JSON; callers read `Order` directly.
        Vec::new()
    }

    fn venue_name(&self) -> &str {
        "mock"
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
    fn full_fill_with_zero_fee_and_slippage() {
        let mock = MockExchange::new(dec!(30000), dec!(0), dec!(1), dec!(1), dec!(0), 1);
        mock.set_balances(dec!(100000), dec!(0));
        let order = mock.place_limit_order(&pair(), Side::Buy, dec!(29850), dec!(0.001));

        let updated = mock.simulate_price_move(dec!(29850));
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].order_id, order.order_id);
        assert_eq!(updated[0].status, OrderStatus::Filled);
        assert_eq!(updated[0].filled, dec!(0.001));
        assert_eq!(mock.get_balance("BTC"), dec!(0.001));
    }

    #[test]
    fn partial_fill_uses_configured_fraction() {
        let mock = MockExchange::new(dec!(30000), dec!(0), dec!(0.5), dec!(0.5), dec!(0), 1);
        mock.set_balances(dec!(100000), dec!(0));
        mock.place_limit_order(&pair(), Side::Buy, dec!(29850), dec!(0.001));

        let updated = mock.simulate_price_move(dec!(29850));
        assert_eq!(updated[0].status, OrderStatus::PartiallyFilled);
        assert_eq!(updated[0].filled, dec!(0.0005));

        // Second tick with no new price move: order already not crossing fresh,
        // but calling again with the same price re-evaluates the remainder.
        let updated2 = mock.simulate_price_move(dec!(29850));
        assert_eq!(updated2[0].status, OrderStatus::Filled);
    }

    #[test]
    fn rejects_buy_on_insufficient_funds() {
        let mock = MockExchange::new(dec!(1000), dec!(0), dec!(1), dec!(1), dec!(0), 1);
        mock.set_balances(dec!(10), dec!(0));
        mock.place_limit_order(&pair(), Side::Buy, dec!(1000), dec!(1.0));

        let updated = mock.simulate_price_move(dec!(1000));
        assert_eq!(updated[0].status, OrderStatus::Rejected);
        assert_eq!(mock.get_balance("USDT"), dec!(10));
        assert_eq!(mock.get_balance("BTC"), dec!(0));
    }

    #[test]
    fn cancel_is_idempotent_on_terminal_orders() {
        let mock = MockExchange::new(dec!(30000), dec!(0), dec!(1), dec!(1), dec!(0), 1);
        let order = mock.place_limit_order(&pair(), Side::Buy, dec!(29850), dec!(0.001));
        let first = mock.cancel(&order.order_id).unwrap();
        let second = mock.cancel(&order.order_id).unwrap();
        assert_eq!(first.status, OrderStatus::Canceled);
        assert_eq!(second.status, OrderStatus::Canceled);
    }

    #[test]
    fn deterministic_with_fixed_seed() {
        let a = MockExchange::new(dec!(30000), dec!(0), dec!(0.3), dec!(0.7), dec!(0.002), 42);
        let b = MockExchange::new(dec!(30000), dec!(0), dec!(0.3), dec!(0.7), dec!(0.002), 42);
        a.set_balances(dec!(1_000_000), dec!(0));
        b.set_balances(dec!(1_000_000), dec!(0));
        let oa = a.place_limit_order(&pair(), Side::Buy, dec!(29850), dec!(1));
        let ob = b.place_limit_order(&pair(), Side::Buy, dec!(29850), dec!(1));
        let ra = a.simulate_price_move(dec!(29850));
        let rb = b.simulate_price_move(dec!(29850));
        assert_eq!(oa.order_id, ob.order_id);
        assert_eq!(ra[0].filled, rb[0].filled);
    }
}
