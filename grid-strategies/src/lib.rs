//! Grid Strategies - ladder parameterisation for the spot grid engine.
//!
//! Kept separate from `grid-core`'s execution/adapter machinery the way
//! the strategy layer is split from the engine crate: this crate only
//! knows how to turn a [`GridConfig`](grid_core::GridConfig) and a
//! reference price into concrete price levels; it never talks to an
//! adapter or holds order state.

pub mod ladder;

pub use ladder::{buy_levels, sell_levels, GridConfigBuilder};
