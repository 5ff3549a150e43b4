//! Domain types shared by the adapter contract, the mock matching engine,
//! and the grid strategy engine.
//!
//! All prices and quantities use [`Decimal`] rather than floating point,
//! matching the exact-precision string formatting the venue wire protocols
//! expect.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::errors::GridError;

/// Interned-ish currency code (`BTC`, `USDT`, ...). A thin newtype over
/// `String` rather than a true interner table: the grid engine only ever
/// handles a handful of currencies per process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Currency(pub String);

impl Currency {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Currency {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Base/quote currency tuple with a display precision and a canonical
/// `BASE/QUOTE` string form.
///
/// Invariant: `base != quote`; `precision >= 0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub base: Currency,
    pub quote: Currency,
    pub precision: u32,
}

impl CurrencyPair {
    pub fn new(base: impl Into<Currency>, quote: impl Into<Currency>, precision: u32) -> Result<Self, GridError> {
        let base = base.into();
        let quote = quote.into();
        if base == quote {
            return Err(GridError::ConfigError(format!(
                "currency pair base and quote must differ, got {base}/{quote}"
            )));
        }
        Ok(Self { base, quote, precision })
    }

    /// Parse the canonical `"BASE/QUOTE"` string form, defaulting precision to 8.
    pub fn parse(s: &str) -> Result<Self, GridError> {
        let (base, quote) = s.split_once('/').ok_or_else(|| {
            GridError::ParseError(format!("currency pair '{s}' is missing a '/' separator"))
        })?;
        Self::new(base, quote, 8)
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Time-in-force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeInForce {
    GoodTilCancel,
    ImmediateOrCancel,
    FillOrKill,
    Day,
}

/// Order type for strategy use. Exchange-specific variants (LimitMaker,
/// StopLoss, ...) exist only inside adapter translation tables, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
}

/// Order lifecycle status. Transitions form a DAG:
/// `NotSent -> New -> {PartiallyFilled -> ...}* -> {Filled | Canceled | Rejected | Expired}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    NotSent,
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected | OrderStatus::Expired
        )
    }

    /// Validate a status transition against the DAG in the domain model.
    /// Terminal states never transition; `New`/`PartiallyFilled` may only
    /// advance forward or repeat `PartiallyFilled`.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (NotSent, New) => true,
            (New, PartiallyFilled | Filled | Canceled | Rejected | Expired) => true,
            (PartiallyFilled, PartiallyFilled | Filled | Canceled | Rejected | Expired) => true,
            _ => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A resting or historical order. `0 <= filled <= quantity` always; once
/// `status` is terminal, `filled` and `status` are frozen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub client_order_id: Option<String>,
    pub pair: CurrencyPair,
    pub side: Side,
    pub order_type: OrderType,
    /// Limit price; zero for an effectively-market order.
    pub price: Decimal,
    pub quantity: Decimal,
    pub filled: Decimal,
    pub status: OrderStatus,
}

impl Order {
    pub fn leaves_qty(&self) -> Decimal {
        self.quantity - self.filled
    }

    /// Apply a status/filled-quantity update, enforcing terminal immutability
    /// and the transition DAG. Returns an error rather than silently dropping
    /// an illegal update.
    pub fn apply_update(&mut self, new_status: OrderStatus, new_filled: Decimal) -> Result<(), GridError> {
        if self.status.is_terminal() {
            return Ok(());
        }
        if new_status != self.status && !self.status.can_transition_to(new_status) {
            return Err(GridError::InvalidStateTransition {
                from: self.status,
                to: new_status,
            });
        }
        self.filled = new_filled;
        self.status = new_status;
        Ok(())
    }
}

/// The canonical, adapter-independent execution report every venue response
/// must be translated into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub order_id: String,
    pub client_order_id: Option<String>,
    pub venue: String,
    pub pair: CurrencyPair,
    pub currency: Currency,
    pub exec_id: String,
    pub exec_type: String,
    pub status: OrderStatus,
    pub side: Side,
    pub order_qty: Decimal,
    pub order_price: Decimal,
    pub last_fill_qty: Decimal,
    pub last_fill_price: Decimal,
    pub leaves_qty: Decimal,
    pub cum_qty: Decimal,
    pub avg_price: Decimal,
    pub text: String,
    pub account: String,
    pub username: String,
    pub tif: TimeInForce,
}

impl ExecutionReport {
    /// Matches the original's `CreateEmptyExecutionReportData()` field order
    /// and defaults: every field present, numeric fields zeroed, `status`
    /// `NotSent`, `side` defaulting to `Buy` (overwritten by the caller).
    pub fn empty(venue: impl Into<String>, pair: CurrencyPair) -> Self {
        Self {
            order_id: String::new(),
            client_order_id: None,
            venue: venue.into(),
            pair,
            currency: Currency::new(""),
            exec_id: String::new(),
            exec_type: String::new(),
            status: OrderStatus::NotSent,
            side: Side::Buy,
            order_qty: Decimal::ZERO,
            order_price: Decimal::ZERO,
            last_fill_qty: Decimal::ZERO,
            last_fill_price: Decimal::ZERO,
            leaves_qty: Decimal::ZERO,
            cum_qty: Decimal::ZERO,
            avg_price: Decimal::ZERO,
            text: String::new(),
            account: String::new(),
            username: String::new(),
            tif: TimeInForce::GoodTilCancel,
        }
    }
}

/// Per-live-order sidecar carried by the grid strategy.
/// `known_filled_qty` is the last-observed cumulative fill, used to compute
/// incremental deltas between polls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridOrderMeta {
    pub side: Side,
    pub price: Decimal,
    pub qty: Decimal,
    pub known_filled_qty: Decimal,
}

/// Grid ladder configuration.
///
/// Invariants: `levels_below, levels_above >= 0`; `step_pct in (0, 1)`;
/// `per_order_qty > 0`; `base_price > 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    pub pair: CurrencyPair,
    pub base_price: Decimal,
    pub levels_below: u32,
    pub levels_above: u32,
    pub step_pct: Decimal,
    pub per_order_qty: Decimal,
    pub max_inventory: Decimal,
    pub fee_rate: Decimal,
}

impl GridConfig {
    pub fn validate(&self) -> Result<(), GridError> {
        if self.step_pct <= Decimal::ZERO || self.step_pct >= Decimal::ONE {
            return Err(GridError::ConfigError(format!(
                "stepPct must be in (0, 1), got {}",
                self.step_pct
            )));
        }
        if self.per_order_qty <= Decimal::ZERO {
            return Err(GridError::ConfigError("perOrderQty must be positive".into()));
        }
        if self.base_price <= Decimal::ZERO {
            return Err(GridError::ConfigError("basePrice must be positive".into()));
        }
        Ok(())
    }
}

/// Per-adapter connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub venue_name: String,
    pub api_key: String,
    pub secret_key: String,
    #[serde(default)]
    pub passphrase: Option<String>,
    pub orders_endpoint: String,
    #[serde(default)]
    pub cancel_endpoint: Option<String>,
    #[serde(default)]
    pub system_time_endpoint: Option<String>,
    pub recv_window_ms: u64,
    pub simulated_trading: bool,
    #[serde(default)]
    pub trade_mode: Option<String>,
    #[serde(default)]
    pub order_monitoring_interval_ms: u64,
}

/// A tracked open order, keyed by a monotonically increasing sequence
/// number at open, used by the order-transaction monitor.
#[derive(Debug, Clone)]
pub struct OrderTransaction {
    pub sender_comp_id: String,
    pub currency: Currency,
    pub last_execution_report: ExecutionReport,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn currency_pair_parses_canonical_form() {
        let pair = CurrencyPair::parse("BTC/USDT").unwrap();
        assert_eq!(pair.base.as_str(), "BTC");
        assert_eq!(pair.quote.as_str(), "USDT");
        assert_eq!(pair.to_string(), "BTC/USDT");
    }

    #[test]
    fn currency_pair_rejects_equal_base_quote() {
        assert!(CurrencyPair::new("BTC", "BTC", 8).is_err());
    }

    #[test]
    fn order_status_transitions_follow_the_dag() {
        assert!(OrderStatus::NotSent.can_transition_to(OrderStatus::New));
        assert!(OrderStatus::New.can_transition_to(OrderStatus::PartiallyFilled));
        assert!(OrderStatus::PartiallyFilled.can_transition_to(OrderStatus::Filled));
        assert!(!OrderStatus::Filled.can_transition_to(OrderStatus::New));
        assert!(!OrderStatus::NotSent.can_transition_to(OrderStatus::Filled));
    }

    #[test]
    fn order_apply_update_freezes_terminal_state() {
        let pair = CurrencyPair::parse("BTC/USDT").unwrap();
        let mut order = Order {
            order_id: "o1".into(),
            client_order_id: None,
            pair,
            side: Side::Buy,
            order_type: OrderType::Limit,
            price: dec!(30000),
            quantity: dec!(1),
            filled: dec!(0),
            status: OrderStatus::New,
        };

        order.apply_update(OrderStatus::Filled, dec!(1)).unwrap();
        assert_eq!(order.status, OrderStatus::Filled);

        // Further updates are ignored once terminal.
        order.apply_update(OrderStatus::New, dec!(0)).unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.filled, dec!(1));
    }

    #[test]
    fn grid_config_validates_step_pct_range() {
        let pair = CurrencyPair::parse("BTC/USDT").unwrap();
        let mut cfg = GridConfig {
            pair,
            base_price: dec!(30000),
            levels_below: 2,
            levels_above: 2,
            step_pct: dec!(0.005),
            per_order_qty: dec!(0.001),
            max_inventory: dec!(1),
            fee_rate: dec!(0),
        };
        assert!(cfg.validate().is_ok());

        cfg.step_pct = dec!(0);
        assert!(cfg.validate().is_err());

        cfg.step_pct = dec!(1);
        assert!(cfg.validate().is_err());
    }
}
