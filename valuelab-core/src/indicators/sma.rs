//! Simple Moving Average (SMA).
//!
//! Trailing mean of the valid observations in the last `period` positions.
//! Defined from the first row (min periods = 1). Each window is summed from
//! scratch, so rounding error never carries from one row to the next.

use super::RollingIndicator;

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            name: format!("sma_{period}"),
        }
    }
}

impl RollingIndicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn window(&self) -> usize {
        self.period
    }

    fn compute(&self, values: &[f64]) -> Vec<Option<f64>> {
        (0..values.len())
            .map(|i| {
                let start = (i + 1).saturating_sub(self.period);
                window_mean(&values[start..=i])
            })
            .collect()
    }
}

/// Mean of the finite values in `window`, summed fresh for every row.
///
/// Deviations are taken from the newest finite value, so a window of
/// identical closes yields exactly that close. Equal windows of different
/// lengths therefore compare equal bit for bit.
fn window_mean(window: &[f64]) -> Option<f64> {
    let anchor = window.iter().rev().copied().find(|v| v.is_finite())?;
    let (deviation, count) = window
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, n), &v| (sum + (v - anchor), n + 1));
    Some(anchor + deviation / count as f64)
}
