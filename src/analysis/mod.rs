//! Analysis modules.
//!
//! The aggregation engine: turns raw statistics into chart-ready series.

pub mod aggregator;

pub use aggregator::*;
