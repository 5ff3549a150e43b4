//! Common utilities shared by both front-door binaries.
//!
//! `CommonArgs`/`init_logging` follow the shared-front-door split used
//! across this workspace's executable crates, and the config-path
//! positional argument follows the original's `argv[1]` convention
//! (`main.cpp`).

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use rust_decimal::Decimal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use grid_core::core::types::CurrencyPair;

/// CLI arguments shared by `grid-simulated` and `grid-live`.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CommonArgs {
    /// Path to a JSON config file. Falls back to built-in defaults if absent.
    pub config: Option<PathBuf>,

    /// Log level (trace/debug/info/warn/error).
    #[arg(short, long, default_value = "info")]
    pub log_level: String,
}

/// Initialize `tracing` with `EnvFilter` precedence: `RUST_LOG` overrides
/// `--log-level` when set.
pub fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    Ok(())
}

/// The external order-book collaborator: supplies a reference mid-price for
/// a pair. A real implementation streams from venue market data; neither
/// binary here implements that transport, since order-book ingestion is
/// explicitly out of scope.
pub trait OrderBookHandle: Send + Sync {
    fn mid_price(&self, pair: &CurrencyPair) -> Decimal;
}

/// A static snapshot used to drive the simulated binary: one fixed
/// reference price per pair, read once at startup.
pub struct StaticOrderBookHandle {
    price: Decimal,
}

impl StaticOrderBookHandle {
    pub fn new(price: Decimal) -> Self {
        Self { price }
    }
}

impl OrderBookHandle for StaticOrderBookHandle {
    fn mid_price(&self, _pair: &CurrencyPair) -> Decimal {
        self.price
    }
}
