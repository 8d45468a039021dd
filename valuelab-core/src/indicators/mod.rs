//! Trailing-window aggregates over a price series.
//!
//! Windows use minimum-periods-one semantics: every position is defined from
//! the first row onward using however many observations precede it, up to the
//! window size. Non-finite inputs are skipped inside a window; a window with
//! no valid observation yields `None`.
//!
//! # Look-ahead contamination guard
//! No output at index t may depend on input at t+1 or later. Every indicator
//! must pass the truncated-vs-full series test in `tests/lookahead_test.rs`.

pub mod sma;
pub mod trailing_max;

pub use sma::Sma;
pub use trailing_max::TrailingMax;

/// A trailing-window statistic over a numeric series.
pub trait RollingIndicator: Send + Sync {
    /// Human-readable name (e.g., "sma_50", "max_252").
    fn name(&self) -> &str;

    /// Maximum number of observations in the window, current one included.
    fn window(&self) -> usize;

    /// Compute the statistic for every position of `values`.
    ///
    /// The output has the same length as the input.
    fn compute(&self, values: &[f64]) -> Vec<Option<f64>>;
}

/// Percent distance of `close` below its trailing high.
///
/// `None` when the close is missing or the high is absent or not strictly
/// positive, so the result is never infinite.
pub fn pct_from_high(close: f64, trailing_high: Option<f64>) -> Option<f64> {
    let high = trailing_high?;
    if !close.is_finite() || high.is_nan() || high <= 0.0 {
        return None;
    }
    Some((close / high - 1.0) * 100.0)
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
