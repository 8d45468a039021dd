//! Rows of the aligned daily table and the finalized metrics table.

use super::bar::PriceBar;
use super::fundamentals::FundamentalValues;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One price day joined with the fundamentals in force on that day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedRow {
    pub bar: PriceBar,
    pub fundamentals: FundamentalValues,
    /// Calendar day of the most recent snapshot applied to this row.
    pub fundamentals_as_of: Option<NaiveDate>,
}

impl AlignedRow {
    pub fn date(&self) -> NaiveDate {
        self.bar.date
    }
}

/// Finalized per-day metrics for one instrument.
///
/// Built once per run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRow {
    pub instrument_id: String,
    pub bar: PriceBar,
    pub fundamentals: FundamentalValues,
    pub fundamentals_as_of: Option<NaiveDate>,
    /// Trailing mean of close over the fast window. Stored as `sma50`
    /// whatever the configured window.
    #[serde(rename = "sma50")]
    pub sma_fast: Option<f64>,
    /// Trailing mean of close over the slow window, stored as `sma200`.
    #[serde(rename = "sma200")]
    pub sma_slow: Option<f64>,
    pub trailing_high: Option<f64>,
    pub pct_from_high: Option<f64>,
    pub bvps: Option<Decimal>,
    pub price_to_book: Option<Decimal>,
    pub enterprise_value: Option<Decimal>,
}

impl MetricsRow {
    pub fn date(&self) -> NaiveDate {
        self.bar.date
    }

    pub fn close(&self) -> f64 {
        self.bar.close
    }
}
