//! Retry-once decorator for idempotent adapter calls.
//!
//! Transport failures are retried once on idempotent operations
//! (`query_order`, `cancel_order`) and never on `place_order` (placing an
//! order twice is not idempotent). Grounded on
//! `grid_core::resilience::backoff::ExponentialBackoff`, generalized from
//! a per-market-data-gap retry idiom to per-adapter-call retry.

use rust_decimal::Decimal;

use super::ExchangeAdapter;
use crate::core::errors::AdapterError;
use crate::core::types::{CurrencyPair, ExecutionReport, Order, OrderType, Side, TimeInForce};
use crate::resilience::backoff::{BackoffConfig, ExponentialBackoff};

/// Wraps any [`ExchangeAdapter`] so that `query_order` and `cancel_order`
/// transparently retry once on a transport failure, with a short backoff
/// delay between attempts. `place_order` is forwarded unchanged.
pub struct RetryingAdapter<A: ExchangeAdapter> {
    inner: A,
}

impl<A: ExchangeAdapter> RetryingAdapter<A> {
    pub fn new(inner: A) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    async fn retry_once<F, Fut>(op: F) -> Result<Order, AdapterError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<Order, AdapterError>>,
    {
        match op().await {
            Ok(order) => Ok(order),
            Err(AdapterError::Transport(_)) => {
                let mut backoff = ExponentialBackoff::with_config(BackoffConfig::aggressive());
                if let Some(delay) = backoff.next_delay() {
                    tokio::time::sleep(delay).await;
                }
                op().await
            }
            Err(other) => Err(other),
        }
    }
}

#[async_trait::async_trait]
impl<A: ExchangeAdapter> ExchangeAdapter for RetryingAdapter<A> {
    async fn place_order(
        &self,
        pair: &CurrencyPair,
        side: Side,
        order_type: OrderType,
        tif: TimeInForce,
        price: Decimal,
        qty: Decimal,
        client_id: Option<&str>,
    ) -> Result<Order, AdapterError> {
        // Never retried: placing an order twice is not idempotent.
        self.inner
            .place_order(pair, side, order_type, tif, price, qty, client_id)
            .await
    }

    async fn query_order(
        &self,
        pair: &CurrencyPair,
        order_id: &str,
        client_id: Option<&str>,
    ) -> Result<Order, AdapterError> {
        Self::retry_once(|| self.inner.query_order(pair, order_id, client_id)).await
    }

    async fn cancel_order(
        &self,
        pair: &CurrencyPair,
        order_id: &str,
        client_id: Option<&str>,
    ) -> Result<Order, AdapterError> {
        Self::retry_once(|| self.inner.cancel_order(pair, order_id, client_id)).await
    }

    fn translate_order_result(&self, json: &serde_json::Value) -> Vec<ExecutionReport> {
        self.inner.translate_order_result(json)
    }

    fn venue_name(&self) -> &str {
        self.inner.venue_name()
    }

    async fn sync_clock_skew(&self) -> Result<(), AdapterError> {
        self.inner.sync_clock_skew().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{CurrencyPair, Order, OrderStatus};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyOnce {
        calls: AtomicU32,
    }

    #[async_trait::async_trait]
    impl ExchangeAdapter for FlakyOnce {
        async fn place_order(
            &self,
            _pair: &CurrencyPair,
            _side: Side,
            _order_type: OrderType,
            _tif: TimeInForce,
            _price: Decimal,
            _qty: Decimal,
            _client_id: Option<&str>,
        ) -> Result<Order, AdapterError> {
            unreachable!("not exercised in this test")
        }

        async fn query_order(
            &self,
            pair: &CurrencyPair,
            order_id: &str,
            _client_id: Option<&str>,
        ) -> Result<Order, AdapterError> {
            let attempt = self.calls.fetch_add(1, Ordering::SeqCst);
            if attempt == 0 {
                return Err(AdapterError::Transport("connection reset".into()));
            }
            Ok(Order {
                order_id: order_id.to_string(),
                client_order_id: None,
                pair: pair.clone(),
                side: Side::Buy,
                order_type: OrderType::Limit,
                price: Decimal::ZERO,
                quantity: Decimal::ZERO,
                filled: Decimal::ZERO,
                status: OrderStatus::New,
            })
        }

        async fn cancel_order(
            &self,
            _pair: &CurrencyPair,
            _order_id: &str,
            _client_id: Option<&str>,
        ) -> Result<Order, AdapterError> {
            unreachable!("not exercised in this test")
        }

        fn translate_order_result(&self, _json: &serde_json::Value) -> Vec<ExecutionReport> {
            Vec::new()
        }

        fn venue_name(&self) -> &str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn query_order_retries_once_on_transport_error() {
        let adapter = RetryingAdapter::new(FlakyOnce { calls: AtomicU32::new(0) });
        let pair = CurrencyPair::parse("BTC/USDT").unwrap();
        let result = adapter.query_order(&pair, "o1", None).await;
        assert!(result.is_ok());
        assert_eq!(adapter.inner().calls.load(Ordering::SeqCst), 2);
    }
}
