//! Concurrency primitives shared across the engine and orchestration.

pub mod ring_buffer;

pub use ring_buffer::{SpscRingBuffer, Worker};
