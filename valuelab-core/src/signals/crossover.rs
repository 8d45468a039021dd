//! Moving average crossover detection: bullish and bearish crosses.
//!
//! A bullish cross fires when the fast average moves above the slow one.
//! A bearish cross fires when it moves below. Only the previous row is
//! consulted, so each decision depends on two consecutive rows.

use crate::domain::SignalKind;
use chrono::NaiveDate;

/// One row of the two trend series being compared.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub fast: Option<f64>,
    pub slow: Option<f64>,
}

/// A detected crossing and the averages observed on its row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossing {
    pub index: usize,
    pub date: NaiveDate,
    pub fast: f64,
    pub slow: f64,
}

/// Crossings split by direction, each list in row order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Crossings {
    pub bullish: Vec<Crossing>,
    pub bearish: Vec<Crossing>,
}

impl Crossings {
    pub fn len(&self) -> usize {
        self.bullish.len() + self.bearish.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bullish.is_empty() && self.bearish.is_empty()
    }

    /// Flatten into `(kind, crossing)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (SignalKind, &Crossing)> {
        self.bullish
            .iter()
            .map(|c| (SignalKind::BullishCross, c))
            .chain(self.bearish.iter().map(|c| (SignalKind::BearishCross, c)))
    }
}

/// Classify the transition from `prev` to `cur`.
///
/// Any missing or NaN value among the four yields `None`.
pub fn classify(prev: &TrendPoint, cur: &TrendPoint) -> Option<SignalKind> {
    let fast_prev = valid(prev.fast)?;
    let slow_prev = valid(prev.slow)?;
    let fast_cur = valid(cur.fast)?;
    let slow_cur = valid(cur.slow)?;

    // Current row: fast > slow. Previous row: fast <= slow.
    if fast_cur > slow_cur && fast_prev <= slow_prev {
        return Some(SignalKind::BullishCross);
    }

    // Current row: fast < slow. Previous row: fast >= slow.
    if fast_cur < slow_cur && fast_prev >= slow_prev {
        return Some(SignalKind::BearishCross);
    }

    None
}

fn valid(v: Option<f64>) -> Option<f64> {
    v.filter(|x| !x.is_nan())
}

/// Scan the series for crossings. Row 0 never qualifies.
pub fn detect(points: &[TrendPoint]) -> Crossings {
    let mut out = Crossings::default();

    for (i, pair) in points.windows(2).enumerate() {
        let (prev, cur) = (&pair[0], &pair[1]);
        let Some(kind) = classify(prev, cur) else {
            continue;
        };
        // classify only returns Some when both values are present.
        let (Some(fast), Some(slow)) = (cur.fast, cur.slow) else {
            continue;
        };
        let crossing = Crossing {
            index: i + 1,
            date: cur.date,
            fast,
            slow,
        };
        match kind {
            SignalKind::BullishCross => out.bullish.push(crossing),
            SignalKind::BearishCross => out.bearish.push(crossing),
        }
    }

    out
}
