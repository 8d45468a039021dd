//! Trailing maximum (high-water mark) over a fixed window.
//!
//! Monotonic deque of candidate indices: O(n) over the whole series. The
//! current position is part of its own window, so a finite input never
//! exceeds its output.

use super::RollingIndicator;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct TrailingMax {
    period: usize,
    name: String,
}

impl TrailingMax {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "TrailingMax period must be >= 1");
        Self {
            period,
            name: format!("max_{period}"),
        }
    }
}

impl RollingIndicator for TrailingMax {
    fn name(&self) -> &str {
        &self.name
    }

    fn window(&self) -> usize {
        self.period
    }

    fn compute(&self, values: &[f64]) -> Vec<Option<f64>> {
        let mut result = Vec::with_capacity(values.len());
        // Indices of finite values, their values strictly decreasing front to back.
        let mut candidates: VecDeque<usize> = VecDeque::new();

        for (i, &v) in values.iter().enumerate() {
            if v.is_finite() {
                while candidates.back().is_some_and(|&j| values[j] <= v) {
                    candidates.pop_back();
                }
                candidates.push_back(i);
            }
            while candidates.front().is_some_and(|&j| j + self.period <= i) {
                candidates.pop_front();
            }
            result.push(candidates.front().map(|&j| values[j]));
        }

        result
    }
}
