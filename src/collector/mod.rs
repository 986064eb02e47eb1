//! Market data collection
//!
//! Fetches historical candle segments from Binance. The matcher consumes
//! these through the `CandleSource` seam so the search can run against a
//! mock in tests.

mod binance;

pub use binance::*;
