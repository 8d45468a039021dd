//! Crossover signal events.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of a trend crossover.
///
/// Ordering puts bullish before bearish so event lists sort the same way on
/// every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalKind {
    /// Fast average moved from at-or-below the slow average to above it.
    BullishCross,
    /// Fast average moved from at-or-above the slow average to below it.
    BearishCross,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::BullishCross => "BULLISH_CROSS",
            SignalKind::BearishCross => "BEARISH_CROSS",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BULLISH_CROSS" => Ok(SignalKind::BullishCross),
            "BEARISH_CROSS" => Ok(SignalKind::BearishCross),
            other => Err(format!("unknown signal kind '{other}'")),
        }
    }
}

/// A dated crossover event with the averages observed on that day.
///
/// Identity for persistence is `(instrument_id, date, kind)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub instrument_id: String,
    pub date: NaiveDate,
    pub kind: SignalKind,
    pub observed_fast_value: f64,
    pub observed_slow_value: f64,
}

impl SignalEvent {
    pub fn key(&self) -> (NaiveDate, SignalKind) {
        (self.date, self.kind)
    }
}
