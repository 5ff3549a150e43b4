//! Domain types for the grid trading engine: currencies, order lifecycle,
//! the canonical execution report, and the signing/clock primitives every
//! adapter is built on.

pub mod errors;
pub mod signing;
pub mod types;

pub use errors::{AdapterError, GridError};
pub use signing::{hmac_sha256_base64, hmac_sha256_hex, Clock, FixedClock, SystemClock};
pub use types::{
    Currency, CurrencyPair, ExecutionReport, GridConfig, GridOrderMeta, Order, OrderStatus,
    OrderTransaction, OrderType, Settings, Side, TimeInForce,
};
