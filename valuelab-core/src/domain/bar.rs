//! PriceBar: one trading day of market data for one instrument.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar as delivered by the upstream price source.
///
/// OHLC consistency is not enforced. Missing prices are represented as
/// `f64::NAN` and are skipped by the rolling windows rather than rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: Option<f64>,
    pub volume: u64,
}

impl PriceBar {
    /// Bar with every price set to `close`. Handy for synthetic series.
    pub fn from_close(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            open: close,
            high: close,
            low: close,
            close,
            adj_close: Some(close),
            volume: 0,
        }
    }

    /// True when the close is a usable observation.
    pub fn has_close(&self) -> bool {
        self.close.is_finite()
    }

    /// True when open, high, low and close are all present.
    pub fn has_ohlc(&self) -> bool {
        self.open.is_finite() && self.high.is_finite() && self.low.is_finite() && self.has_close()
    }

    /// Basic OHLC sanity check. Informational only; the pipeline never drops
    /// bars that fail it.
    pub fn is_sane(&self) -> bool {
        if !self.has_ohlc() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }
}
