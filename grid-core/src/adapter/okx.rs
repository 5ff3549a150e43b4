//! OKX adapter: JSON-body order placement, base64 HMAC-SHA256 signing over
//! `timestamp || method || path(+query) || body`.
//!
//! Grounded on `ConnectionORD::Sign()`/`SendOrder`/`QueryOrder`/`CancelOrder`:
//! header names (`OK-ACCESS-*`), the `data[]` response array, and the
//! `sCode`/`sMsg` error fields.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde_json::json;

use super::{tif_mnemonic, ExchangeAdapter, RequestDescription};
use crate::core::errors::AdapterError;
use crate::core::signing::{hmac_sha256_base64, Clock};
use crate::core::types::{CurrencyPair, Order, OrderStatus, OrderType, Settings, Side, TimeInForce};

pub struct OkxAdapter {
    settings: Settings,
    clock: Arc<dyn Clock>,
    http: reqwest::Client,
    /// Offset (venue time minus local clock, in ms) applied to every
    /// signed timestamp after a one-shot [`Self::sync_clock_skew`] call.
    skew_ms: AtomicI64,
}

impl OkxAdapter {
    pub fn new(settings: Settings, clock: Arc<dyn Clock>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.recv_window_ms.max(1000)))
            .build()
            .expect("reqwest client builds with sane defaults");
        Self {
            settings,
            clock,
            http,
            skew_ms: AtomicI64::new(0),
        }
    }

    fn symbol(pair: &CurrencyPair) -> String {
        format!("{}-{}", pair.base, pair.quote)
    }

    /// One-shot clock-skew sync against the venue's `systemTime` endpoint,
    /// grounded on `ConnectionORD::GetSystemTime()`: fetch the venue's
    /// server time and record the offset from the local clock so later
    /// signed requests fall inside the venue's receive window even when
    /// the local clock drifts. A no-op when no endpoint is configured.
    pub async fn sync_clock_skew(&self) -> Result<(), AdapterError> {
        let Some(endpoint) = &self.settings.system_time_endpoint else {
            return Ok(());
        };
        let resp = self
            .http
            .get(endpoint)
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| AdapterError::InvalidResponse(e.to_string()))?;
        let venue_ms: i64 = json
            .get("data")
            .and_then(|v| v.as_array())
            .and_then(|a| a.first())
            .and_then(|e| e.get("ts"))
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| AdapterError::InvalidResponse("missing data[0].ts in system time response".into()))?;
        let skew = venue_ms - self.clock.now_ms();
        self.skew_ms.store(skew, Ordering::Relaxed);
        Ok(())
    }

    fn sign(&self, method: &str, path: &str, body: &str) -> (String, String) {
        let ts = crate::core::signing::to_iso8601_ms(self.clock.now_ms() + self.skew_ms.load(Ordering::Relaxed));
        let prehash = format!("{ts}{method}{path}{body}");
        let sig = hmac_sha256_base64(&self.settings.secret_key, &prehash);
        (ts, sig)
    }

    fn build_request(&self, method: &str, path: &str, body: String) -> RequestDescription {
        let (ts, sig) = self.sign(method, path, &body);
        let mut headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("OK-ACCESS-KEY".to_string(), self.settings.api_key.clone()),
            ("OK-ACCESS-SIGN".to_string(), sig),
            ("OK-ACCESS-TIMESTAMP".to_string(), ts),
        ];
        if let Some(passphrase) = &self.settings.passphrase {
            headers.push(("OK-ACCESS-PASSPHRASE".to_string(), passphrase.clone()));
        }
        if self.settings.simulated_trading {
            headers.push(("x-simulated-trading".to_string(), "1".to_string()));
        }
        RequestDescription {
            method: method.to_string(),
            url: format!("{}{}", self.settings.orders_endpoint, path),
            query: Vec::new(),
            headers,
            body,
        }
    }

    async fn send(&self, desc: RequestDescription) -> Result<serde_json::Value, AdapterError> {
        let mut builder = match desc.method.as_str() {
            "GET" => self.http.get(&desc.url),
            "POST" => self.http.post(&desc.url).body(desc.body.clone()),
            "DELETE" => self.http.delete(&desc.url).body(desc.body.clone()),
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

    fn order_from_data_element(&self, pair: &CurrencyPair, element: &serde_json::Value) -> Order {
        let status_str = element.get("state").and_then(|v| v.as_str()).unwrap_or("live");
        let status = match status_str {
            "live" => OrderStatus::New,
            "partially_filled" => OrderStatus::PartiallyFilled,
            "filled" => OrderStatus::Filled,
            "canceled" => OrderStatus::Canceled,
            _ => OrderStatus::Rejected,
        };
        let decimal_field = |key: &str| -> Decimal {
            element
                .get(key)
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse().ok())
                .unwrap_or(Decimal::ZERO)
        };
        Order {
            order_id: element
                .get("ordId")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            client_order_id: element
                .get("clOrdId")
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
            price: decimal_field("px"),
            quantity: decimal_field("sz"),
            filled: decimal_field("accFillSz"),
            status,
        }
    }
}

#[async_trait::async_trait]
impl ExchangeAdapter for OkxAdapter {
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
        let body = json!({
            "instId": Self::symbol(pair),
            "tdMode": self.settings.trade_mode.clone().unwrap_or_else(|| "cash".to_string()),
            "side": side.to_string(),
            "ordType": tif_mnemonic(tif, order_type),
            "px": price.to_string(),
            "sz": qty.to_string(),
            "clOrdId": client_id.unwrap_or_default(),
        })
        .to_string();
        let desc = self.build_request("POST", "/api/v5/trade/order", body);
        let json = self.send(desc).await?;
        let reports = self.translate_order_result(&json);
        reports
            .first()
            .map(|r| Order {
                order_id: r.order_id.clone(),
                client_order_id: r.client_order_id.clone(),
                pair: pair.clone(),
                side,
                order_type,
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
        client_id: Option<&str>,
    ) -> Result<Order, AdapterError> {
        let path = format!(
            "/api/v5/trade/order?instId={}&ordId={}&clOrdId={}",
            Self::symbol(pair),
            order_id,
            client_id.unwrap_or_default()
        );
        let desc = self.build_request("GET", &path, String::new());
        let json = self.send(desc).await?;
        let data = json.get("data").and_then(|v| v.as_array());
        match data.and_then(|d| d.first()) {
            Some(element) => Ok(self.order_from_data_element(pair, element)),
            None => Err(AdapterError::InvalidResponse("order not found in response".into())),
        }
    }

    async fn cancel_order(
        &self,
        pair: &CurrencyPair,
        order_id: &str,
        client_id: Option<&str>,
    ) -> Result<Order, AdapterError> {
        let body = json!({
            "instId": Self::symbol(pair),
            "ordId": order_id,
            "clOrdId": client_id.unwrap_or_default(),
        })
        .to_string();
        let desc = self.build_request("POST", "/api/v5/trade/cancel-order", body);
        let json = self.send(desc).await?;
        let data = json.get("data").and_then(|v| v.as_array());
        match data.and_then(|d| d.first()) {
            Some(element) => Ok(self.order_from_data_element(pair, element)),
            None => Err(AdapterError::InvalidResponse("empty cancel response".into())),
        }
    }

    fn translate_order_result(&self, json: &serde_json::Value) -> Vec<crate::core::types::ExecutionReport> {
        use crate::core::types::ExecutionReport;

        let top_code: i64 = json
            .get("code")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        if top_code != 0 {
            let msg = json.get("msg").and_then(|v| v.as_str()).unwrap_or("unknown error");
            let mut report = ExecutionReport::empty("okx", CurrencyPair::parse("BTC/USDT").unwrap());
            report.status = OrderStatus::Rejected;
            report.text = format!("code={top_code} msg={msg}");
            return vec![report];
        }

        let Some(data) = json.get("data").and_then(|v| v.as_array()) else {
            return Vec::new();
        };

        data.iter()
            .map(|element| {
                let pair = element
                    .get("instId")
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.split_once('-'))
                    .and_then(|(b, q)| CurrencyPair::new(b, q, 8).ok())
                    .unwrap_or_else(|| CurrencyPair::parse("BTC/USDT").unwrap());

                let s_code: i64 = element
                    .get("sCode")
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0);

                let decimal_field = |key: &str| -> Decimal {
                    element
                        .get(key)
                        .and_then(|v| v.as_str())
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(Decimal::ZERO)
                };

                let mut report = ExecutionReport::empty("okx", pair);
                report.order_id = element.get("ordId").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                report.client_order_id = element
                    .get("clOrdId")
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string);
                report.side = if element.get("side").and_then(|v| v.as_str()) == Some("sell") {
                    Side::Sell
                } else {
                    Side::Buy
                };
                report.order_price = decimal_field("px");
                report.order_qty = decimal_field("sz");
                report.cum_qty = decimal_field("accFillSz");
                report.leaves_qty = report.order_qty - report.cum_qty;

                if s_code != 0 {
                    let s_msg = element.get("sMsg").and_then(|v| v.as_str()).unwrap_or("unknown");
                    report.status = OrderStatus::Rejected;
                    report.text = format!("sCode={s_code} sMsg={s_msg}");
                } else {
                    report.status = match element.get("state").and_then(|v| v.as_str()) {
                        Some("filled") => OrderStatus::Filled,
                        Some("partially_filled") => OrderStatus::PartiallyFilled,
                        Some("canceled") => OrderStatus::Canceled,
                        _ => OrderStatus::New,
                    };
                }
                report
            })
            .collect()
    }

    fn venue_name(&self) -> &str {
        "okx"
    }

    async fn sync_clock_skew(&self) -> Result<(), AdapterError> {
        OkxAdapter::sync_clock_skew(self).await
    }
}
