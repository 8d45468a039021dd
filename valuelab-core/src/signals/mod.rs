//! Signal detection over finalized metrics.
//!
//! Detectors see only the trend series they are handed. They never read the
//! store or any state carried across runs.

pub mod crossover;

pub use crossover::{classify, detect, Crossing, Crossings, TrendPoint};
