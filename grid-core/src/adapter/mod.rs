//! The exchange adapter contract: a uniform order-lifecycle capability set
//! implemented identically by the mock matching engine and by each
//! per-venue REST adapter.
//!
//! Replaces the inheritance hierarchy of the original (virtual
//! `ExchangeAPI` base class) with a capability trait plus a
//! schema-keyed registry, since adapter selection happens at runtime from
//! configuration rather than at compile time.

pub mod coinbase;
pub mod okx;
pub mod retry;

use std::collections::HashMap;

use crate::core::errors::AdapterError;
use crate::core::signing::Clock;
use crate::core::types::{CurrencyPair, ExecutionReport, Order, OrderType, Settings, Side, TimeInForce};

pub use coinbase::CoinbaseAdapter;
pub use okx::OkxAdapter;
pub use retry::RetryingAdapter;

/// An immutable request-description record passed to the transport layer.
/// Per-venue adapters build this record; a single transport function turns
/// it into an HTTP call. Grounded on the "callbacks as customisation
/// points -> immutable record" redesign: venue code never touches
/// `reqwest` directly.
#[derive(Debug, Clone)]
pub struct RequestDescription {
    pub method: String,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// The order-lifecycle capability set every adapter (live or mock) implements.
#[async_trait::async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Serialise, sign, and send an order placement request. `price` is
    /// zero iff the order is effectively market.
    async fn place_order(
        &self,
        pair: &CurrencyPair,
        side: Side,
        order_type: OrderType,
        tif: TimeInForce,
        price: rust_decimal::Decimal,
        qty: rust_decimal::Decimal,
        client_id: Option<&str>,
    ) -> Result<Order, AdapterError>;

    /// Idempotent status read.
    async fn query_order(
        &self,
        pair: &CurrencyPair,
        order_id: &str,
        client_id: Option<&str>,
    ) -> Result<Order, AdapterError>;

    /// Cancel by id. Cancelling an order already terminal returns the
    /// terminal state without error.
    async fn cancel_order(
        &self,
        pair: &CurrencyPair,
        order_id: &str,
        client_id: Option<&str>,
    ) -> Result<Order, AdapterError>;

    /// Lossless mapping of a venue-specific JSON response to canonical
    /// reports. A non-zero top-level error code produces exactly one
    /// report with a `Rejected` status and a `text` describing the error.
    fn translate_order_result(&self, json: &serde_json::Value) -> Vec<ExecutionReport>;

    /// Venue display name, used for logging and `ExecutionReport::venue`.
    fn venue_name(&self) -> &str;

    /// One-shot clock-skew sync against the venue's system-time endpoint,
    /// run once at startup so signed timestamps stay inside the venue's
    /// receive window. A no-op for adapters with no such endpoint (the
    /// default) or none configured.
    async fn sync_clock_skew(&self) -> Result<(), AdapterError> {
        Ok(())
    }
}

/// Factory function signature used by [`AdapterRegistry`].
pub type AdapterFactory = fn(Settings, std::sync::Arc<dyn Clock>) -> Box<dyn ExchangeAdapter>;

/// A schema-name-keyed registry of adapter factories, selected by the
/// connection manager from the configured `schema` field.
#[derive(Default)]
pub struct AdapterRegistry {
    factories: HashMap<String, AdapterFactory>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.register("okx", |settings, clock| {
            Box::new(RetryingAdapter::new(OkxAdapter::new(settings, clock)))
        });
        registry.register("coinbase", |settings, clock| {
            Box::new(RetryingAdapter::new(CoinbaseAdapter::new(settings, clock)))
        });
        registry
    }

    pub fn register(&mut self, schema: &str, factory: AdapterFactory) {
        self.factories.insert(schema.to_string(), factory);
    }

    pub fn build(
        &self,
        schema: &str,
        settings: Settings,
        clock: std::sync::Arc<dyn Clock>,
    ) -> Result<Box<dyn ExchangeAdapter>, AdapterError> {
        let factory = self.factories.get(schema).ok_or_else(|| {
            AdapterError::InvalidResponse(format!("no adapter registered for schema '{schema}'"))
        })?;
        Ok(factory(settings, clock))
    }
}

/// Format a TIF value using the ordinal-to-mnemonic mapping every
/// per-venue adapter uses: `IoC -> "ioc"`, `FoK -> "fok"`, else `"limit"`
/// or `"market"` depending on order type.
pub fn tif_mnemonic(tif: TimeInForce, order_type: OrderType) -> &'static str {
    match tif {
        TimeInForce::ImmediateOrCancel => "ioc",
        TimeInForce::FillOrKill => "fok",
        TimeInForce::GoodTilCancel | TimeInForce::Day => match order_type {
            OrderType::Limit => "limit",
            OrderType::Market => "market",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_known_schemas() {
        let registry = AdapterRegistry::new();
        let settings = Settings {
            venue_name: "okx".into(),
            api_key: "k".into(),
            secret_key: "s".into(),
            passphrase: Some("p".into()),
            orders_endpoint: "https://example.invalid/orders".into(),
            cancel_endpoint: None,
            system_time_endpoint: None,
            recv_window_ms: 5000,
            simulated_trading: true,
            trade_mode: None,
            order_monitoring_interval_ms: 1000,
        };
        let clock: std::sync::Arc<dyn Clock> = std::sync::Arc::new(crate::core::signing::FixedClock(0));
        assert!(registry.build("okx", settings, clock).is_ok());
    }

    #[test]
    fn registry_rejects_unknown_schema() {
        let registry = AdapterRegistry::new();
        let settings = Settings {
            venue_name: "x".into(),
            api_key: "k".into(),
            secret_key: "s".into(),
            passphrase: None,
            orders_endpoint: "https://example.invalid/orders".into(),
            cancel_endpoint: None,
            system_time_endpoint: None,
            recv_window_ms: 5000,
            simulated_trading: true,
            trade_mode: None,
            order_monitoring_interval_ms: 1000,
        };
        let clock: std::sync::Arc<dyn Clock> = std::sync::Arc::new(crate::core::signing::FixedClock(0));
        assert!(registry.build("bybit", settings, clock).is_err());
    }

    #[test]
    fn tif_mnemonic_maps_ordinals() {
        assert_eq!(tif_mnemonic(TimeInForce::ImmediateOrCancel, OrderType::Limit), "ioc");
        assert_eq!(tif_mnemonic(TimeInForce::FillOrKill, OrderType::Limit), "fok");
        assert_eq!(tif_mnemonic(TimeInForce::GoodTilCancel, OrderType::Limit), "limit");
        assert_eq!(tif_mnemonic(TimeInForce::GoodTilCancel, OrderType::Market), "market");
    }
}
