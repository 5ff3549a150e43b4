//! Shared front-door wiring for the `grid-simulated` and `grid-live` binaries.

pub mod common;
