//! `grid-simulated`: drives the grid engine against the in-process
//! [`MockExchange`](grid_core::MockExchange) instead of a live venue.
//!
//! Grounded on the original's mock-driven dev loop (`main.cpp`'s
//! `simulateTicks`/`tickDelayMs` config keys) and on this workspace's
//! simulated-front-door idiom: parse args, wire a simulated executor,
//! run a bounded tick loop, print a summary on exit.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;

use grid_bins::common::{init_logging, CommonArgs, OrderBookHandle, StaticOrderBookHandle};
use grid_core::config::GridFileConfig;
use grid_core::core::types::CurrencyPair;
use grid_core::resilience::{install_panic_handler, KillSwitch};
use grid_core::{GridEngine, MockExchange};
use grid_strategies::{buy_levels, sell_levels};

/// The reference price a real order-book feed would hand the engine at
/// startup. Market-data ingestion is an external collaborator; this
/// binary seeds a fixed snapshot instead.
const SIMULATED_STARTUP_PRICE: Decimal = dec!(30000);

#[tokio::main]
async fn main() -> Result<()> {
    let args = CommonArgs::parse();
    init_logging(&args.log_level)?;
    install_panic_handler();

    let cfg = match &args.config {
        Some(path) => GridFileConfig::load(path)?,
        None => GridFileConfig::default(),
    };

    let order_book = StaticOrderBookHandle::new(SIMULATED_STARTUP_PRICE);
    let pair = CurrencyPair::parse(&cfg.pair)?;
    let mid_price = order_book.mid_price(&pair);

    let grid_config = cfg.to_grid_config(mid_price)?;
    info!(?grid_config, "starting simulated grid engine");
    info!(
        buys = ?buy_levels(mid_price, grid_config.step_pct, grid_config.levels_below),
        sells = ?sell_levels(mid_price, grid_config.step_pct, grid_config.levels_above),
        "planned ladder levels"
    );

    let mock = Arc::new(MockExchange::new_random(
        mid_price,
        cfg.fee_rate,
        cfg.partial_fill_min_pct,
        cfg.partial_fill_max_pct,
        cfg.slippage_max_pct,
    ));
    // Seed enough quote/base balance that the ladder's worst case never
    // starves on funds purely as an artifact of the demo harness.
    mock.set_balances(Decimal::from(1_000_000), Decimal::from(10));

    let mut engine = GridEngine::new(grid_config)?;
    engine.place_initial_grid(mock.as_ref()).await?;

    let kill_switch = KillSwitch::install();
    let mut interval = tokio::time::interval(Duration::from_millis(cfg.tick_delay_ms.max(1)));
    let mut tick: u64 = 0;
    let mut price = mid_price;

    loop {
        if kill_switch.should_stop() {
            info!("shutdown requested, exiting tick loop");
            break;
        }
        if let Some(limit) = cfg.simulate_ticks {
            if tick >= limit {
                info!(ticks = tick, "reached simulateTicks limit, exiting");
                break;
            }
        }

        interval.tick().await;
        tick += 1;

        // Drift the reference price by a small deterministic step per tick
        // so the ladder has something to cross; a live binary would read
        // this from the order-book feed instead.
        let drift = Decimal::new((tick % 7) as i64 - 3, 3); // +/- 0.003
        price *= Decimal::ONE + drift;
        mock.simulate_price_move(price);

        let btc = mock.get_balance("BTC");
        let usdt = mock.get_balance("USDT");
        engine.check_filled_orders(mock.as_ref(), btc, usdt).await?;
    }

    info!(
        final_btc = %mock.get_balance("BTC"),
        final_usdt = %mock.get_balance("USDT"),
        active_orders = engine.active_orders().len(),
        "simulated run complete"
    );

    Ok(())
}
