//! The grid strategy engine: ladder placement, fill detection, hedge
//! placement, partial-fill delta tracking, and inventory caps.

pub mod grid;

pub use grid::GridEngine;
