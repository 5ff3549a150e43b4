//! `grid-live`: drives the grid engine against a real exchange adapter
//! selected from the configured per-venue `Settings`.
//!
//! Grounded on the original's `main.cpp` startup sequence (load config,
//! build the connection manager, fetch the mid-price, start the strategy)
//! and on the shared single-venue-front-door idiom used across this
//! workspace's executable crates. Order-book ingestion is an external
//! collaborator: this binary takes the startup reference price as a CLI
//! flag rather than implementing a market-data transport. Likewise, the
//! adapter contract exposes only place/query/cancel/translate, not a
//! balance query; inventory/balance pre-checks therefore run against
//! `--assume-btc`/`--assume-usdt`, which a real deployment would instead
//! refresh from the venue's balance endpoint each tick.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rust_decimal::Decimal;
use tracing::{info, warn};

use grid_bins::common::{init_logging, CommonArgs};
use grid_core::adapter::ExchangeAdapter;
use grid_core::config::GridFileConfig;
use grid_core::core::types::CurrencyPair;
use grid_core::resilience::{install_panic_handler, KillSwitch};
use grid_core::{AdapterRegistry, GridEngine, OrderTransactionMonitor, SystemClock};
use grid_strategies::{buy_levels, sell_levels};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct LiveArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Startup reference mid-price, until a real order-book feed is wired.
    #[arg(long)]
    mid_price: Decimal,

    /// Starting base-asset balance assumption for inventory pre-checks.
    #[arg(long, default_value = "0")]
    assume_btc: Decimal,

    /// Starting quote-asset balance assumption for inventory pre-checks.
    #[arg(long, default_value = "1000000")]
    assume_usdt: Decimal,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = LiveArgs::parse();
    init_logging(&args.common.log_level)?;
    install_panic_handler();

    let cfg = match &args.common.config {
        Some(path) => GridFileConfig::load(path)?,
        None => GridFileConfig::default(),
    };

    let Some(settings) = cfg.adapters.first().cloned() else {
        bail!("config has no adapter settings; grid-live requires at least one entry under \"adapters\"");
    };
    if cfg.adapters.len() > 1 {
        warn!(
            count = cfg.adapters.len(),
            "multiple adapter settings configured; grid-live is single-venue and uses only the first"
        );
    }

    let pair = CurrencyPair::parse(&cfg.pair)?;
    let clock = Arc::new(SystemClock);
    let registry = AdapterRegistry::new();
    let schema = settings.venue_name.clone();
    let monitoring_interval_ms = settings.order_monitoring_interval_ms;
    let adapter: Arc<dyn ExchangeAdapter> = registry
        .build(&schema, settings, clock)
        .with_context(|| format!("no adapter registered for schema '{schema}'"))?
        .into();

    if let Err(e) = adapter.sync_clock_skew().await {
        warn!(error = %e, "clock-skew sync against venue system-time endpoint failed, proceeding with local clock");
    }

    let grid_config = cfg.to_grid_config(args.mid_price)?;
    info!(?grid_config, venue = adapter.venue_name(), "starting live grid engine");
    info!(
        buys = ?buy_levels(args.mid_price, grid_config.step_pct, grid_config.levels_below),
        sells = ?sell_levels(args.mid_price, grid_config.step_pct, grid_config.levels_above),
        "planned ladder levels"
    );

    let mut engine = GridEngine::new(grid_config)?;
    engine.place_initial_grid(adapter.as_ref()).await?;

    let kill_switch = KillSwitch::install();

    if monitoring_interval_ms > 0 {
        let monitor = Arc::new(OrderTransactionMonitor::new(monitoring_interval_ms));
        let monitor_adapter = adapter.clone();
        let monitor_kill_switch = kill_switch.clone();
        let monitor_pair = pair.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(monitoring_interval_ms));
            while !monitor_kill_switch.should_stop() {
                interval.tick().await;
                let updates = monitor.process_order_transactions(monitor_adapter.as_ref(), &monitor_pair).await;
                for report in updates {
                    info!(order_id = %report.order_id, status = ?report.status, "order transaction update");
                }
            }
        });
    } else {
        warn!("order monitoring interval is zero, not tracking order transactions");
    }

    let mut interval = tokio::time::interval(Duration::from_millis(cfg.tick_delay_ms.max(1)));
    let (btc, usdt) = (args.assume_btc, args.assume_usdt);
    loop {
        if kill_switch.should_stop() {
            info!("shutdown requested, exiting tick loop");
            break;
        }
        interval.tick().await;
        // Without a balance endpoint on the adapter contract, a hedge's
        // effect on these assumed balances cannot be observed here; the
        // inventory caps are still enforced against the seeded estimate.
        engine.check_filled_orders(adapter.as_ref(), btc, usdt).await?;
    }

    Ok(())
}
