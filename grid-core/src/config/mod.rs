//! Runtime configuration.
//!
//! A single JSON file describes the ladder parameters and per-venue
//! settings. Grounded on the original's `loadConfig`: a missing file falls
//! back to built-in defaults with a logged `WARN` (the original treats a
//! failed `fopen` the same way), but malformed JSON is fatal at startup —
//! replacing the original's hand-rolled key/value scanner with
//! `serde_json`.

use std::path::Path;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::errors::GridError;
use crate::core::types::{CurrencyPair, GridConfig, Settings};

fn default_pair() -> String {
    "BTC/USDT".to_string()
}

fn default_levels() -> u32 {
    5
}

fn default_step_percent() -> Decimal {
    dec!(0.005)
}

fn default_per_order_qty() -> Decimal {
    dec!(0.001)
}

fn default_max_position_btc() -> Decimal {
    dec!(1.0)
}

fn default_fee_rate() -> Decimal {
    dec!(0.001)
}

fn default_partial_fill_min_pct() -> Decimal {
    dec!(0.1)
}

fn default_partial_fill_max_pct() -> Decimal {
    dec!(0.9)
}

fn default_slippage_max_pct() -> Decimal {
    dec!(0.0005)
}

fn default_tick_delay_ms() -> u64 {
    1000
}

/// On-disk shape of the JSON config file. Field names mirror the wire keys,
/// not Rust naming convention, since this struct is (de)serialized directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridFileConfig {
    #[serde(default = "default_pair")]
    pub pair: String,
    #[serde(rename = "levelsAbove", default = "default_levels")]
    pub levels_above: u32,
    #[serde(rename = "levelsBelow", default = "default_levels")]
    pub levels_below: u32,
    #[serde(rename = "stepPercent", default = "default_step_percent")]
    pub step_percent: Decimal,
    #[serde(rename = "perOrderQty", default = "default_per_order_qty")]
    pub per_order_qty: Decimal,
    #[serde(rename = "maxPositionBtc", default = "default_max_position_btc")]
    pub max_position_btc: Decimal,
    #[serde(rename = "feeRate", default = "default_fee_rate")]
    pub fee_rate: Decimal,
    #[serde(rename = "partialFillMinPct", default = "default_partial_fill_min_pct")]
    pub partial_fill_min_pct: Decimal,
    #[serde(rename = "partialFillMaxPct", default = "default_partial_fill_max_pct")]
    pub partial_fill_max_pct: Decimal,
    #[serde(rename = "slippageMaxPct", default = "default_slippage_max_pct")]
    pub slippage_max_pct: Decimal,
    #[serde(rename = "tickDelayMs", default = "default_tick_delay_ms")]
    pub tick_delay_ms: u64,
    #[serde(rename = "simulateTicks", default)]
    pub simulate_ticks: Option<u64>,
    #[serde(default)]
    pub adapters: Vec<Settings>,
}

impl Default for GridFileConfig {
    fn default() -> Self {
        Self {
            pair: default_pair(),
            levels_above: default_levels(),
            levels_below: default_levels(),
            step_percent: default_step_percent(),
            per_order_qty: default_per_order_qty(),
            max_position_btc: default_max_position_btc(),
            fee_rate: default_fee_rate(),
            partial_fill_min_pct: default_partial_fill_min_pct(),
            partial_fill_max_pct: default_partial_fill_max_pct(),
            slippage_max_pct: default_slippage_max_pct(),
            tick_delay_ms: default_tick_delay_ms(),
            simulate_ticks: None,
            adapters: Vec::new(),
        }
    }
}

impl GridFileConfig {
    /// Load from `path`. A missing file is not fatal — logs a `WARN` and
    /// falls back to [`GridFileConfig::default`]. Malformed JSON in a file
    /// that does exist is fatal (`GridError::ConfigError`), since a typo in
    /// a ladder parameter silently falling back to defaults would be worse
    /// than refusing to start.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, GridError> {
        let path = path.as_ref();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config file unreadable, using defaults");
                return Ok(Self::default());
            }
        };

        serde_json::from_str(&raw)
            .map_err(|e| GridError::ConfigError(format!("{}: {}", path.display(), e)))
    }

    /// Build the [`GridConfig`] the strategy engine consumes, anchored at
    /// `base_price` (the reference mid-price read from the order book at
    /// startup — not itself a config field, per spec's external
    /// order-book collaborator).
    pub fn to_grid_config(&self, base_price: Decimal) -> Result<GridConfig, GridError> {
        let pair = CurrencyPair::parse(&self.pair)?;
        let config = GridConfig {
            pair,
            base_price,
            levels_below: self.levels_below,
            levels_above: self.levels_above,
            step_pct: self.step_percent,
            per_order_qty: self.per_order_qty,
            max_inventory: self.max_position_btc,
            fee_rate: self.fee_rate,
        };
        config.validate()?;
        Ok(config)
    }
}
