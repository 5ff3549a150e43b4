//! Coinbase adapter: query-string order placement, uppercase `BUY`/`SELL`,
//! dash-separated symbols, hex HMAC-SHA256 signing.
//!
//! Grounded on `coinbase::ConnectionORD.cpp`'s message dispatch and
//! `SendOrder`'s query-string (not JSON-body) placement, and on the
//! generic `Tools::EncryptWithHMAC` hex encoding used outside the OKX path.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde_json::json;

use super::{ExchangeAdapter, RequestDescription};
use crate::core::errors::AdapterError;
use crate::core::signing::{hmac_sha256_hex, Clock};
use crate::core::types::{CurrencyPair, Order, OrderStatus, OrderType, Settings, Side, TimeInForce};

pub struct CoinbaseAdapter {
    settings: Settings,
    clock: Arc<dyn Clock>,
    http: reqwest::Client,
}

impl CoinbaseAdapter {
    pub fn new(settings: Settings, clock: Arc<dyn Clock>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.recv_window_ms.max(1000)))
            .build()
            .expect("reqwest client builds with sane defaults");
        Self { settings, clock, http }
    }

    fn symbol(pair: &CurrencyPair) -> String {
        format!("{}-{}", pair.base, pair.quote)
    }

    fn side_str(side: Side) -> &'static str {
        match side {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    fn build_request(&self, method: &str, path: &str, query: &str) -> RequestDescription {
        let ts = (self.clock.now_ms() / 1000).to_string();
        let prehash = format!("{ts}{method}{path}?{query}");
        let sig = hmac_sha256_hex(&self.settings.secret_key, &prehash);
        let mut headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("CB-ACCESS-KEY".to_string(), self.settings.api_key.clone()),
            ("CB-ACCESS-SIGN".to_string(), sig),
            ("CB-ACCESS-TIMESTAMP".to_string(), ts),
        ];
        if let Some(passphrase) = &self.settings.passphrase {
            headers.push(("CB-ACCESS-PASSPHRASE".to_string(), passphrase.clone()));
        }
        RequestDescription {
            method: method.to_string(),
            url: format!("{}{}", self.settings.orders_endpoint, path),
            query: Vec::new(),
            headers,
            body: String::new(),
        }
    }

    async fn send(&self, desc: RequestDescription, query: &str) -> Result<serde_json::Value, AdapterError> {
        let url = if query.is_empty() {
            desc.url.clone()
        } else {
            format!("{}?{}", desc.url, query)
        };
        let mut builder = match desc.method.as_str() {
            "GET" => self.http.get(&url),
            "POST" => self.http.post(&url),
            "DELETE" => self.http.delete(&url),
            other => return Err(AdapterError::InvalidResponse(format!("unsupported method {other}"))),
        };
        for (k, v) in &desc.headers {
            builder = builder.header(k, v);
        }
        let resp = builder
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        resp.json::<serde_json::Value>()
            .await
            .map_err(|e| AdapterError::InvalidResponse(e.to_string()))
    }

    fn decimal_field(element: &serde_json::Value, key: &str) -> Decimal {
        element
            .get(key)
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .unwrap_or(Decimal::ZERO)
    }

    fn status_from_str(s: &str) -> OrderStatus {
        match s {
            "open" | "pending" => OrderStatus::New,
            "done" | "filled" => OrderStatus::Filled,
            "canceled" | "cancelled" => OrderStatus::Canceled,
            "rejected" => OrderStatus::Rejected,
            _ => OrderStatus::New,
        }
    }

    fn order_from_json(&self, pair: &CurrencyPair, element: &serde_json::Value) -> Order {
        let filled = Self::decimal_field(element, "filled_size");
        let quantity = Self::decimal_field(element, "size");
        let status_str = element.get("status").and_then(|v| v.as_str()).unwrap_or("open");
        let status = if filled > Decimal::ZERO && filled < quantity {
            OrderStatus::PartiallyFilled
        } else {
            Self::status_from_str(status_str)
        };
        Order {
            order_id: element.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            client_order_id: element
                .get("client_oid")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            pair: pair.clone(),
            side: if element.get("side").and_then(|v| v.as_str()) == Some("sell") {
                Side::Sell
            } else {
                Side::Buy
            },
            order_type: OrderType::Limit,
            price: Self::decimal_field(element, "price"),
            quantity,
            filled,
            status,
        }
    }
}

#[async_trait::async_trait]
impl ExchangeAdapter for CoinbaseAdapter {
    async fn place_order(
        &self,
        pair: &CurrencyPair,
        side: Side,
        _order_type: OrderType,
        _tif: TimeInForce,
        price: Decimal,
        qty: Decimal,
        client_id: Option<&str>,
    ) -> Result<Order, AdapterError> {
        let query = format!(
            "product_id={}&side={}&price={}&size={}&type=limit&client_oid={}",
            Self::symbol(pair),
            Self::side_str(side),
            price,
            qty,
            client_id.unwrap_or_default(),
        );
        let desc = self.build_request("POST", "/orders", &query);
        let json = self.send(desc, &query).await?;
        let reports = self.translate_order_result(&json);
        reports
            .first()
            .map(|r| Order {
                order_id: r.order_id.clone(),
                client_order_id: r.client_order_id.clone(),
                pair: pair.clone(),
                side,
                order_type: OrderType::Limit,
                price,
                quantity: qty,
                filled: r.cum_qty,
                status: r.status,
            })
            .ok_or_else(|| AdapterError::InvalidResponse("empty order placement response".into()))
    }

    async fn query_order(
        &self,
        pair: &CurrencyPair,
        order_id: &str,
        _client_id: Option<&str>,
    ) -> Result<Order, AdapterError> {
        let path = format!("/orders/{order_id}");
        let desc = self.build_request("GET", &path, "");
        let json = self.send(desc, "").await?;
        let reports = self.translate_order_result(&json);
        reports
            .first()
            .map(|r| Order {
                order_id: r.order_id.clone(),
                client_order_id: r.client_order_id.clone(),
                pair: pair.clone(),
                side: r.side,
                order_type: OrderType::Limit,
                price: r.order_price,
                quantity: r.order_qty,
                filled: r.cum_qty,
                status: r.status,
            })
            .ok_or_else(|| AdapterError::InvalidResponse("order not found in response".into()))
    }

    async fn cancel_order(
        &self,
        pair: &CurrencyPair,
        order_id: &str,
        _client_id: Option<&str>,
    ) -> Result<Order, AdapterError> {
        let path = format!("/orders/{order_id}");
        let desc = self.build_request("DELETE", &path, "");
        let json = self.send(desc, "").await?;
        let reports = self.translate_order_result(&json);
        reports
            .first()
            .map(|r| Order {
                order_id: r.order_id.clone(),
                client_order_id: r.client_order_id.clone(),
                pair: pair.clone(),
                side: r.side,
                order_type: OrderType::Limit,
                price: r.order_price,
                quantity: r.order_qty,
                filled: r.cum_qty,
                status: r.status,
            })
            .ok_or_else(|| AdapterError::InvalidResponse("empty cancel response".into()))
    }

    fn translate_order_result(&self, json: &serde_json::Value) -> Vec<crate::core::types::ExecutionReport> {
        use crate::core::types::ExecutionReport;

        if let Some(err) = json.get("error") {
            let code = err.get("code").and_then(|v| v.as_i64()).unwrap_or(-1);
            let msg = err.get("msg").and_then(|v| v.as_str()).unwrap_or("unknown");
            let mut report = ExecutionReport::empty("coinbase", CurrencyPair::parse("BTC/USDT").unwrap());
            report.status = OrderStatus::Rejected;
            report.text = format!("code={code} msg={msg}");
            return vec![report];
        }

        let pair = json
            .get("product_id")
            .and_then(|v| v.as_str())
            .and_then(|s| s.split_once('-'))
            .and_then(|(b, q)| CurrencyPair::new(b, q, 8).ok())
            .unwrap_or_else(|| CurrencyPair::parse("BTC/USDT").unwrap());

        let order = self.order_from_json(&pair, json);
        let mut report = ExecutionReport::empty("coinbase", pair);
        report.order_id = order.order_id;
        report.client_order_id = order.client_order_id;
        report.side = order.side;
        report.order_price = order.price;
        report.order_qty = order.quantity;
        report.cum_qty = order.filled;
        report.leaves_qty = order.quantity - order.filled;
        report.status = order.status;
        vec![report]
    }

    fn venue_name(&self) -> &str {
        "coinbase"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings {
            venue_name: "coinbase".into(),
            api_key: "k".into(),
            secret_key: "s".into(),
            passphrase: Some("p".into()),
            orders_endpoint: "https://coinbase.invalid".into(),
            cancel_endpoint: None,
            system_time_endpoint: None,
            recv_window_ms: 5000,
            simulated_trading: false,
            trade_mode: None,
            order_monitoring_interval_ms: 1000,
        }
    }

    #[test]
    fn translate_order_result_maps_partial_fill() {
        let clock: Arc<dyn Clock> = Arc::new(crate::core::signing::FixedClock(0));
        let adapter = CoinbaseAdapter::new(settings(), clock);
        let json = json!({
            "id": "abc",
            "product_id": "BTC-USDT",
            "side": "buy",
            "price": "30000",
            "size": "1.0",
            "filled_size": "0.5",
            "status": "open",
        });
        let reports = adapter.translate_order_result(&json);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].status, OrderStatus::PartiallyFilled);
        assert_eq!(reports[0].leaves_qty, Decimal::from_str_exact("0.5").unwrap());
    }

    #[test]
    fn translate_order_result_reports_error_shape() {
        let clock: Arc<dyn Clock> = Arc::new(crate::core::signing::FixedClock(0));
        let adapter = CoinbaseAdapter::new(settings(), clock);
        let json = json!({ "error": { "code": 400, "msg": "Insufficient funds" } });
        let reports = adapter.translate_order_result(&json);
        assert_eq!(reports[0].status, OrderStatus::Rejected);
        assert!(reports[0].text.contains("400"));
    }
}
